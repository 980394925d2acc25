//! Character-level text diff for human-readable change descriptions.
//!
//! Myers O(ND) over the middle section left after stripping the common
//! prefix and suffix. Edit scripts longer than [`MAX_EDIT_DISTANCE`]
//! collapse into one removal plus one insertion.

use serde::Serialize;

/// Edit distance past which the diff stops searching for a minimal script.
pub const MAX_EDIT_DISTANCE: usize = 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextChangeKind {
    Unchanged,
    Added,
    Removed,
}

/// One run of characters with the same change kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TextChange {
    pub value: String,
    pub kind: TextChangeKind,
}

impl TextChange {
    pub fn added(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: TextChangeKind::Added,
        }
    }

    pub fn removed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: TextChangeKind::Removed,
        }
    }

    pub fn unchanged(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: TextChangeKind::Unchanged,
        }
    }

    /// True for insertions and deletions.
    pub fn is_edit(&self) -> bool {
        self.kind != TextChangeKind::Unchanged
    }
}

/// Capability: character diff of two strings.
pub trait TextDiffer {
    fn diff_chars(&self, original: &str, updated: &str, ignore_case: bool) -> Vec<TextChange>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CharDiffer;

impl TextDiffer for CharDiffer {
    fn diff_chars(&self, original: &str, updated: &str, ignore_case: bool) -> Vec<TextChange> {
        let a: Vec<char> = original.chars().collect();
        let b: Vec<char> = updated.chars().collect();
        let eq = |x: char, y: char| {
            x == y || (ignore_case && x.to_lowercase().eq(y.to_lowercase()))
        };

        let mut prefix = 0;
        while prefix < a.len() && prefix < b.len() && eq(a[prefix], b[prefix]) {
            prefix += 1;
        }
        let mut suffix = 0;
        while suffix < a.len() - prefix
            && suffix < b.len() - prefix
            && eq(a[a.len() - 1 - suffix], b[b.len() - 1 - suffix])
        {
            suffix += 1;
        }

        let a_mid = &a[prefix..a.len() - suffix];
        let b_mid = &b[prefix..b.len() - suffix];

        let mut steps: Vec<(TextChangeKind, char)> = Vec::with_capacity(a.len() + b.len());
        steps.extend(b[..prefix].iter().map(|&c| (TextChangeKind::Unchanged, c)));
        match shortest_edit(a_mid, b_mid, &eq) {
            Some(middle) => steps.extend(middle),
            None => {
                steps.extend(a_mid.iter().map(|&c| (TextChangeKind::Removed, c)));
                steps.extend(b_mid.iter().map(|&c| (TextChangeKind::Added, c)));
            }
        }
        steps.extend(b[b.len() - suffix..].iter().map(|&c| (TextChangeKind::Unchanged, c)));

        merge_runs(steps)
    }
}

fn merge_runs(steps: Vec<(TextChangeKind, char)>) -> Vec<TextChange> {
    let mut runs: Vec<TextChange> = Vec::new();
    for (kind, c) in steps {
        match runs.last_mut() {
            Some(last) if last.kind == kind => last.value.push(c),
            _ => runs.push(TextChange {
                value: c.to_string(),
                kind,
            }),
        }
    }
    runs
}

/// Myers' greedy forward search with a per-step trace of the furthest
/// reaching x on each diagonal. Returns `None` when the edit distance
/// exceeds [`MAX_EDIT_DISTANCE`].
fn shortest_edit<F>(a: &[char], b: &[char], eq: &F) -> Option<Vec<(TextChangeKind, char)>>
where
    F: Fn(char, char) -> bool,
{
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    // The distance is never below |n - m|.
    if (n - m).unsigned_abs() > MAX_EDIT_DISTANCE {
        return None;
    }

    // Step d touches diagonals -(d+1)..=(d+1) only.
    let limit = max.min(MAX_EDIT_DISTANCE as isize);
    let offset = limit + 1;
    let mut v = vec![0isize; (2 * limit + 3) as usize];
    let at = |k: isize| (k + offset) as usize;
    // trace[d] holds v for diagonals -(d+1)..=(d+1) before step d ran.
    let mut trace: Vec<Vec<isize>> = Vec::new();

    let mut found = false;
    'search: for d in 0..=limit {
        trace.push((-(d + 1)..=(d + 1)).map(|k| v[at(k)]).collect());

        let mut k = -d;
        while k <= d {
            let mut x = if k == -d || (k != d && v[at(k - 1)] < v[at(k + 1)]) {
                v[at(k + 1)]
            } else {
                v[at(k - 1)] + 1
            };
            let mut y = x - k;
            while x < n && y < m && eq(a[x as usize], b[y as usize]) {
                x += 1;
                y += 1;
            }
            v[at(k)] = x;
            if x >= n && y >= m {
                found = true;
                break 'search;
            }
            k += 2;
        }
    }
    if !found {
        return None;
    }

    let mut steps = Vec::new();
    let (mut x, mut y) = (n, m);
    for (d, snapshot) in trace.iter().enumerate().rev() {
        let d = d as isize;
        let get = |k: isize| snapshot[(k + d + 1) as usize];
        let k = x - y;
        let prev_k = if k == -d || (k != d && get(k - 1) < get(k + 1)) {
            k + 1
        } else {
            k - 1
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;

        while x > prev_x && y > prev_y {
            steps.push((TextChangeKind::Unchanged, b[(y - 1) as usize]));
            x -= 1;
            y -= 1;
        }
        if d > 0 {
            if x == prev_x {
                steps.push((TextChangeKind::Added, b[(y - 1) as usize]));
            } else {
                steps.push((TextChangeKind::Removed, a[(x - 1) as usize]));
            }
        }
        x = prev_x;
        y = prev_y;
    }
    steps.reverse();
    Some(steps)
}
