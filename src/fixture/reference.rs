//! The reference histories checked in as test fixtures.
//!
//! Each backend gets the same story (add, modify, move, rename, delete,
//! awkward file names) within the limits of what it can record. Git also
//! covers empty messages, empty commits, a rebase and a merge.

use crate::backend::{BackendKind, Identity};
use crate::fixture::step::RepositoryFixtureSpec;
use chrono::{DateTime, Duration, Utc};
use std::path::Path;

/// Branch created by the Git reference history
pub const BRANCH: &str = "a-branch";

/// Default branch of the Git reference history
pub const MAIN_BRANCH: &str = "master";

/// Reference script for `kind`, built at `target`
pub fn script(kind: BackendKind, target: &Path, author: Identity) -> RepositoryFixtureSpec {
    let spec = RepositoryFixtureSpec::new(kind, target, author);
    match kind {
        BackendKind::Git => git(spec),
        BackendKind::Hg => hg(spec),
        BackendKind::Svn => svn(spec),
    }
}

/// 2014-08-01T00:00:00Z as a Unix timestamp
const AUGUST_2014: i64 = 1_406_851_200;

/// 2014-08-`day` `hour`:`minute` UTC
fn aug(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    let offset = i64::from(day - 1) * 86_400 + i64::from(hour) * 3_600 + i64::from(minute) * 60;
    DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(AUGUST_2014 + offset)
}

fn git(spec: RepositoryFixtureSpec) -> RepositoryFixtureSpec {
    spec.write_file("file1.txt", "file1 content\n")
        .commit("initial commit", aug(10, 0, 0))
        .write_file("file2.txt", "file2 content\n")
        .write_file("file3.txt", "file3 content\n")
        .commit("added file2, file3", aug(11, 0, 0))
        .write_file("file2.txt", "file2 new content\n")
        .write_file("file3.txt", "file3 new content\n")
        .commit("modified file2, file3", aug(12, 14, 0))
        .make_dir("folder1")
        .move_file("file1.txt", "folder1/file1.txt")
        .commit("moved file1", aug(13, 14, 0))
        .make_dir("folder2")
        .move_file("folder1/file1.txt", "folder2/renamed_file1.txt")
        .commit("moved and renamed file1", aug(14, 14, 0))
        .remove_file("folder2/renamed_file1.txt")
        .commit("deleted file1", aug(15, 14, 0))
        .write_file("\"file with spaces.txt\"", "123\n")
        .commit("added file with spaces and quotes", aug(16, 14, 0))
        .write_file("non-ascii.txt", "non-ascii содержимое\n")
        .commit("non-ascii комментарий", aug(17, 15, 0))
        .write_file("file4.txt", "commit with no message\n")
        .commit("", aug(18, 16, 0))
        .commit("commit with no changes", aug(19, 17, 0))
        .create_branch(BRANCH)
        .checkout_branch(BRANCH)
        .write_file("file1-branch.txt", "file1 branch content\n")
        .commit("added file1-branch.txt", aug(20, 18, 0))
        .checkout_branch(MAIN_BRANCH)
        .write_file("file1-master.txt", "file1-master content\n")
        .commit("added file1-master.txt", aug(20, 18, 10))
        .checkout_branch(BRANCH)
        .rebase(MAIN_BRANCH, "added file1-branch.txt", aug(20, 18, 20))
        .write_file("file2-branch.txt", "file2 branch content\n")
        .commit("added file2-branch.txt", aug(21, 19, 0))
        .checkout_branch(MAIN_BRANCH)
        .write_file("file2-master.txt", "file2-master content\n")
        .commit("added file2-master.txt", aug(21, 19, 10))
        .merge_branch(BRANCH, "merged branch into master", aug(21, 19, 20))
}

fn hg(spec: RepositoryFixtureSpec) -> RepositoryFixtureSpec {
    spec.write_file("file1.txt", "file1 content\n")
        .commit("initial commit", aug(10, 14, 0))
        .write_file("file2.txt", "file2 content\n")
        .write_file("file3.txt", "file3 content\n")
        .commit("added file2, file3", aug(11, 14, 0))
        .write_file("file2.txt", "file2 new content\n")
        .write_file("file3.txt", "file3 new content\n")
        .commit("modified file2, file3", aug(12, 14, 0))
        .make_dir("folder1")
        .move_file("file1.txt", "folder1/file1.txt")
        .commit("moved file1", aug(13, 14, 0))
        .make_dir("folder2")
        .move_file("folder1/file1.txt", "folder2/renamed_file1.txt")
        .commit("moved and renamed file1", aug(14, 14, 0))
        .remove_file("folder2/renamed_file1.txt")
        .commit("deleted file1", aug(15, 14, 0))
        .write_file("\"file with spaces.txt\"", "123\n")
        .commit("added file with spaces and quotes", aug(16, 14, 0))
        .write_file("non-ascii.txt", "non-ascii содержимое\n")
        .commit("non-ascii комментарий", aug(17, 15, 0))
}

fn svn(spec: RepositoryFixtureSpec) -> RepositoryFixtureSpec {
    spec.write_file("file1.txt", "file1 content\n")
        .commit("initial commit", aug(10, 15, 0))
        .write_file("file2.txt", "file2 content\n")
        .write_file("file3.txt", "file3 content\n")
        .commit("added file2, file3", aug(11, 15, 0))
        .write_file("file2.txt", "file2 new content\n")
        .write_file("file3.txt", "file3 new content\n")
        .commit("modified file2, file3", aug(12, 15, 0))
        .make_dir("folder1")
        .move_file("file1.txt", "folder1/file1.txt")
        .commit("moved file1", aug(13, 15, 0))
        .make_dir("folder2")
        .move_file("folder1/file1.txt", "folder2/renamed_file1.txt")
        .write_file("file2.txt", "file2 new new content\n")
        .commit("moved and renamed file1", aug(14, 15, 0))
        .remove_file("folder2/renamed_file1.txt")
        .commit("deleted file1", aug(15, 15, 0))
        .write_file("\"file with spaces.txt\"", "123\n")
        .commit("added file with spaces and quotes", aug(16, 15, 0))
}
