// Copyright (c) 2026 AsmLens Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// Source-to-instruction lookup. `SourceIndex` is a sorted snapshot of a
/// listing keyed by `(normalized path+filename, line)`; `locate` answers
/// "which rendered line corresponds to this source line" with nearest-match
/// semantics, never an error. A stale or unmapped source line still has to
/// produce a usable jump target.
use crate::listing::DisassemblyListing;

/// A source position the extension wants to jump from. `column` is part of
/// the contract for callers but takes no part in matching.
#[derive(Debug, Clone, Default)]
pub struct LineQuery {
    pub path: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

impl LineQuery {
    fn sort_key(&self) -> String {
        let joined = format!("{}/{}", self.path, self.filename);
        joined.replace('\\', "/").to_uppercase()
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    key: String,
    line: u32,
    sequence_index: usize,
}

/// Sorted copy of a listing for source-location queries. Entries keep the
/// `sequence_index` they had in the listing; sorting reorders the index,
/// never the identity of a record.
#[derive(Debug, Clone, Default)]
pub struct SourceIndex {
    entries: Vec<IndexEntry>,
}

impl SourceIndex {
    /// Build the sorted snapshot. The sort is stable, so records with the
    /// same file and line keep their original relative (address) order.
    pub fn build(listing: &DisassemblyListing) -> Self {
        let mut entries: Vec<IndexEntry> = listing
            .records
            .iter()
            .map(|record| IndexEntry {
                key: record.location.sort_key(),
                line: record.location.line,
                sequence_index: record.sequence_index,
            })
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key).then(a.line.cmp(&b.line)));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the sequence index of the instruction at or after the queried
    /// source line.
    ///
    /// Sorted linear scan: the first entry whose key is >= the query key is
    /// the boundary. If that entry is the queried file, scan forward inside
    /// the file group for the first line >= the queried line, falling back to
    /// the head of the group when the file ends first (a line past the end of
    /// a function still jumps somewhere sensible). If the file is absent the
    /// boundary entry is the head of the alphabetically next group and we
    /// return it as-is. An empty index returns 0, meaning no job has
    /// completed yet.
    pub fn locate(&self, query: &LineQuery) -> usize {
        let wanted = query.sort_key();

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.key < wanted {
                continue;
            }
            if entry.key == wanted {
                for candidate in &self.entries[i..] {
                    if candidate.key != wanted {
                        break;
                    }
                    if candidate.line >= query.line {
                        return candidate.sequence_index;
                    }
                }
            }
            return entry.sequence_index;
        }

        // Query sorts after every entry, or the index is empty.
        0
    }
}
