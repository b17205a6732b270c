//! Index state as reported by `git status --porcelain -z`.

/// Paths staged in the index, grouped by kind of change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedChanges {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    /// Unmerged paths left over from an interrupted merge or rebase.
    pub conflicting: Vec<String>,
}

impl StagedChanges {
    /// Parse NUL-separated porcelain v1 output.
    pub fn parse(porcelain: &str) -> Self {
        let mut changes = StagedChanges::default();
        let mut entries = porcelain.split('\0');

        while let Some(entry) = entries.next() {
            if entry.len() < 4 {
                continue;
            }
            let code = entry.as_bytes();
            let (x, y) = (code[0] as char, code[1] as char);
            let path = entry[3..].to_string();

            if is_unmerged(x, y) {
                changes.conflicting.push(path);
                continue;
            }

            match x {
                'A' => changes.added.push(path),
                'M' | 'T' => changes.changed.push(path),
                'D' => changes.removed.push(path),
                'R' | 'C' => {
                    // Renames and copies carry the original path as the next entry.
                    if let Some(original) = entries.next() {
                        if x == 'R' {
                            changes.removed.push(original.to_string());
                        }
                    }
                    changes.added.push(path);
                }
                _ => {}
            }
        }

        changes
    }

    /// Whether anything would be recorded by a commit.
    pub fn has_staged(&self) -> bool {
        !self.added.is_empty() || !self.changed.is_empty() || !self.removed.is_empty()
    }
}

/// Distinct paths listed by `git ls-files --unmerged -z`, in index order.
///
/// Each entry reads `<mode> <object> <stage>\t<path>`; a path appears once per stage.
pub fn parse_unmerged(ls_files: &str) -> Vec<String> {
    let mut paths: Vec<String> = Vec::new();
    for entry in ls_files.split('\0') {
        let Some((_, path)) = entry.split_once('\t') else {
            continue;
        };
        if paths.last().map(String::as_str) != Some(path) {
            paths.push(path.to_string());
        }
    }
    paths
}

fn is_unmerged(x: char, y: char) -> bool {
    x == 'U' || y == 'U' || (x == 'A' && y == 'A') || (x == 'D' && y == 'D')
}
