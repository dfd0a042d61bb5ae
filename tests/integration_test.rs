mod helpers;

use chrono::{TimeZone, Utc};
use helpers::{author, create_workspace, date, executor, git, tool_available, write_config};
use pretty_assertions::assert_eq;
use std::fs;
use vcs_fixtures::backend::BackendVersion;
use vcs_fixtures::fixture::reference;
use vcs_fixtures::history;
use vcs_fixtures::pipeline::{self, RegenerateOptions};
use vcs_fixtures::runner::CommandJournal;
use vcs_fixtures::{
    AppError, BackendKind, ChangeStatus, CommandRunner, ConfigArtifact, ConfigError, FileChange,
    RepositoryFixtureSpec, RepositoryHandle, VcsError,
};

#[test]
fn test_git_version_detection() {
    let version = BackendVersion::detect(
        BackendKind::Git,
        std::path::Path::new("git"),
        &[],
        &CommandRunner::new(),
    )
    .expect("Failed to detect git version");
    assert!(version.major >= 2);
    assert!(version.is_supported());
}

#[test]
fn test_two_commits_oldest_first() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "first\n")
        .commit("first", date(10))
        .write_file("file.txt", "second\n")
        .commit("second", date(11));

    let handle = executor(settings).build(&spec).expect("Failed to build fixture");
    assert_eq!(handle.revisions_created(), 2);
    assert!(handle.skipped().is_empty());

    let records = history::extract(&handle).expect("Failed to extract history");
    assert_eq!(records.len(), 2);
    assert!(records[0].is_root());
    assert_eq!(records[1].parents, vec![records[0].id.clone()]);
    assert_eq!(records[0].committer_time, date(10));
    assert_eq!(records[1].committer_time, date(11));
    assert_eq!(records[0].author_name, "Some Author");
    assert_eq!(records[0].author_email, "some.author@mail.com");
    assert_eq!(
        records[0].changes,
        vec![FileChange::new(ChangeStatus::Added, "file.txt")]
    );
    assert_eq!(
        records[1].changes,
        vec![FileChange::new(ChangeStatus::Modified, "file.txt")]
    );

    let head = git(&target, &["rev-parse", "HEAD"]);
    assert_eq!(records[1].id, head.trim());
}

#[test]
fn test_existing_target_is_rejected() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "content\n")
        .commit("first", date(10));

    let executor = executor(settings);
    executor.build(&spec).expect("First build should succeed");
    let before = git(&target, &["rev-parse", "HEAD"]);

    let result = executor.build(&spec);
    assert!(matches!(result, Err(VcsError::Precondition(_))));
    assert_eq!(git(&target, &["rev-parse", "HEAD"]), before);

    // Cleaning rebuilds the same history
    let handle = executor.clean(true).build(&spec).expect("Clean build should succeed");
    let records = history::extract(&handle).unwrap();
    assert_eq!(records[0].id, before.trim());
}

#[test]
fn test_move_and_rename_are_detected() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("a.txt", "some content that survives the move\n")
        .commit("add", date(10))
        .move_file("a.txt", "b.txt")
        .commit("rename", date(11))
        .make_dir("folder")
        .move_file("b.txt", "folder/b.txt")
        .commit("move", date(12));

    let handle = executor(settings).build(&spec).unwrap();
    let records = history::extract(&handle).unwrap();

    assert_eq!(records[1].changes, vec![FileChange::relocated("a.txt", "b.txt")]);
    assert_eq!(records[1].changes[0].status, ChangeStatus::Renamed);
    assert_eq!(
        records[2].changes,
        vec![FileChange::relocated("b.txt", "folder/b.txt")]
    );
    assert_eq!(records[2].changes[0].status, ChangeStatus::Moved);
}

#[test]
fn test_empty_message_and_empty_commit() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "content\n")
        .commit("", date(10))
        .commit("nothing changed", date(11));

    let handle = executor(settings).build(&spec).unwrap();
    assert!(handle.skipped().is_empty());

    let records = history::extract(&handle).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].subject, "");
    assert!(records[1].changes.is_empty());
}

#[test]
fn test_separate_author_and_committer_dates() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "content\n")
        .commit_dated("dated", date(10), date(12));

    let handle = executor(settings).build(&spec).unwrap();
    let records = history::extract(&handle).unwrap();
    assert_eq!(records[0].author_time, date(10));
    assert_eq!(records[0].committer_time, date(12));
}

#[test]
fn test_failed_step_leaves_partial_repository() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "content\n")
        .commit("first", date(10))
        .remove_file("does-not-exist.txt")
        .commit("never reached", date(11));

    let result = executor(settings).build(&spec);
    assert!(matches!(result, Err(VcsError::Execution(_))));

    // The first commit is still there for inspection
    assert_eq!(git(&target, &["rev-list", "--count", "HEAD"]).trim(), "1");
}

#[test]
fn test_reference_git_history() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = reference::script(BackendKind::Git, &target, author());

    let handle = executor(settings).build(&spec).expect("Failed to build reference fixture");
    assert_eq!(handle.revisions_created(), 15);

    let records = history::extract(&handle).unwrap();
    assert_eq!(records.len(), 15);
    assert_eq!(git(&target, &["rev-list", "--count", "HEAD"]).trim(), "15");

    let subjects: Vec<&str> = records.iter().map(|r| r.subject.as_str()).collect();
    assert_eq!(
        subjects,
        vec![
            "initial commit",
            "added file2, file3",
            "modified file2, file3",
            "moved file1",
            "moved and renamed file1",
            "deleted file1",
            "added file with spaces and quotes",
            "non-ascii комментарий",
            "",
            "commit with no changes",
            "added file1-master.txt",
            "added file1-branch.txt",
            "added file2-branch.txt",
            "added file2-master.txt",
            "merged branch into master",
        ]
    );

    assert_eq!(
        records[3].changes,
        vec![FileChange::relocated("file1.txt", "folder1/file1.txt")]
    );
    assert_eq!(
        records[4].changes,
        vec![FileChange::relocated(
            "folder1/file1.txt",
            "folder2/renamed_file1.txt"
        )]
    );
    assert_eq!(
        records[5].changes,
        vec![FileChange::new(ChangeStatus::Deleted, "folder2/renamed_file1.txt")]
    );
    assert_eq!(
        records[6].changes,
        vec![FileChange::new(ChangeStatus::Added, "\"file with spaces.txt\"")]
    );
    assert_eq!(
        records[7].changes,
        vec![FileChange::new(ChangeStatus::Added, "non-ascii.txt")]
    );
    assert!(records[9].changes.is_empty());

    // The rebased commit keeps its author date
    let rebased = &records[11];
    assert_eq!(
        rebased.author_time,
        Utc.with_ymd_and_hms(2014, 8, 20, 18, 0, 0).unwrap()
    );
    assert_eq!(
        rebased.committer_time,
        Utc.with_ymd_and_hms(2014, 8, 20, 18, 20, 0).unwrap()
    );
    assert_eq!(rebased.parents, vec![records[10].id.clone()]);

    let merge = &records[14];
    assert!(merge.is_merge());
    assert_eq!(
        merge.parents,
        vec![records[13].id.clone(), records[12].id.clone()]
    );

    assert!(records
        .windows(2)
        .all(|pair| pair[0].committer_time <= pair[1].committer_time));
}

#[test]
fn test_reference_history_is_deterministic() {
    let (_first_temp, first_target, first_settings) = create_workspace(BackendKind::Git);
    let (_second_temp, second_target, second_settings) = create_workspace(BackendKind::Git);

    let first = executor(first_settings)
        .build(&reference::script(BackendKind::Git, &first_target, author()))
        .unwrap();
    let second = executor(second_settings)
        .build(&reference::script(BackendKind::Git, &second_target, author()))
        .unwrap();

    let first_ids: Vec<String> = history::extract(&first).unwrap().into_iter().map(|r| r.id).collect();
    let second_ids: Vec<String> = history::extract(&second).unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(first_ids, second_ids);
}

#[test]
fn test_regenerate_updates_config() {
    let (temp, target, _) = create_workspace(BackendKind::Git);
    let config_path = write_config(temp.path(), BackendKind::Git, &target);

    let regenerated = pipeline::regenerate(BackendKind::Git, &config_path, &RegenerateOptions::default())
        .expect("Failed to regenerate fixture");
    assert_eq!(regenerated.records.len(), 15);

    let config = ConfigArtifact::load(&config_path).unwrap();
    assert_eq!(config.revisions(), regenerated.revisions());
    assert_eq!(config.reference_project().unwrap(), target.as_path());

    // The journal sits next to the fixture, not inside it
    let journal = CommandJournal::path_beside(&target);
    let contents = fs::read_to_string(&journal).expect("Journal should exist");
    assert!(contents.contains("[exit:0]"));
    assert!(contents.contains("# step 1: write file1.txt"));
    assert!(!target.join(journal.file_name().unwrap()).exists());

    // A second run without --clean refuses to touch the fixture
    let again = pipeline::regenerate(BackendKind::Git, &config_path, &RegenerateOptions::default());
    assert!(again.is_err());
    assert_eq!(
        ConfigArtifact::load(&config_path).unwrap().revisions(),
        regenerated.revisions()
    );
}

#[test]
fn test_regenerate_without_sync_keeps_config() {
    let (temp, target, _) = create_workspace(BackendKind::Git);
    let config_path = write_config(temp.path(), BackendKind::Git, &target);
    let before = fs::read_to_string(&config_path).unwrap();

    let options = RegenerateOptions {
        sync: false,
        journal: false,
        ..RegenerateOptions::default()
    };
    pipeline::regenerate(BackendKind::Git, &config_path, &options).unwrap();

    assert_eq!(fs::read_to_string(&config_path).unwrap(), before);
    assert!(!CommandJournal::path_beside(&target).exists());
}

#[test]
fn test_config_without_revisions_fails_before_build() {
    let (temp, target, _) = create_workspace(BackendKind::Git);
    let config_path = temp.path().join("git-config.json");
    fs::write(
        &config_path,
        serde_json::to_string_pretty(&serde_json::json!({
            "referenceProject": target,
            "authorWithEmail": "A <a@b.c>",
        }))
        .unwrap(),
    )
    .unwrap();

    let result = pipeline::regenerate(BackendKind::Git, &config_path, &RegenerateOptions::default());
    assert!(matches!(result, Err(AppError::Config(ConfigError::Format(_)))));
    assert!(!target.exists());
    assert!(!CommandJournal::path_beside(&target).exists());

    // An existing fixture survives even when cleaning was requested
    fs::create_dir_all(&target).unwrap();
    fs::write(target.join("keep.txt"), "old fixture\n").unwrap();
    let options = RegenerateOptions {
        clean: true,
        ..RegenerateOptions::default()
    };
    let result = pipeline::regenerate(BackendKind::Git, &config_path, &options);
    assert!(matches!(result, Err(AppError::Config(ConfigError::Format(_)))));
    assert_eq!(fs::read_to_string(target.join("keep.txt")).unwrap(), "old fixture\n");
}

#[test]
fn test_rewriting_identical_content_is_not_a_change() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("f.txt", "same\n")
        .commit("first", date(10))
        .write_file("f.txt", "same\n")
        .commit("second", date(11));

    let handle = executor(settings).build(&spec).expect("Rewrite should not abort the build");
    assert_eq!(handle.revisions_created(), 2);

    let records = history::extract(&handle).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].subject, "second");
    assert!(records[1].changes.is_empty());
}

#[test]
fn test_open_existing_fixture() {
    let (_temp, target, settings) = create_workspace(BackendKind::Git);
    let spec = RepositoryFixtureSpec::new(BackendKind::Git, &target, author())
        .write_file("file.txt", "content\n")
        .commit("first", date(10));
    executor(settings.clone()).build(&spec).unwrap();

    let handle = RepositoryHandle::open(BackendKind::Git, &settings, &target, CommandRunner::new())
        .expect("Failed to open fixture");
    let records = history::extract(&handle).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(handle.revisions_created(), 0);
}

#[test]
fn test_mercurial_skips_unsupported_steps() {
    if !tool_available("hg") {
        eprintln!("hg not installed, skipping");
        return;
    }

    let (_temp, target, settings) = create_workspace(BackendKind::Hg);
    let spec = RepositoryFixtureSpec::new(BackendKind::Hg, &target, author())
        .write_file("file.txt", "content\n")
        .commit("first", date(10))
        .commit("nothing changed", date(11))
        .create_branch("a-branch")
        .write_file("file.txt", "changed\n")
        .commit("", date(12))
        .commit("second", date(13));

    let handle = executor(settings).build(&spec).unwrap();
    assert_eq!(handle.revisions_created(), 2);
    let skipped: Vec<usize> = handle.skipped().iter().map(|s| s.index).collect();
    assert_eq!(skipped, vec![2, 3, 5]);

    let records = history::extract(&handle).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].subject, "second");
    assert_eq!(records[1].committer_time, date(13));
}

#[test]
fn test_mercurial_skips_commit_after_identical_rewrite() {
    if !tool_available("hg") {
        eprintln!("hg not installed, skipping");
        return;
    }

    let (_temp, target, settings) = create_workspace(BackendKind::Hg);
    let spec = RepositoryFixtureSpec::new(BackendKind::Hg, &target, author())
        .write_file("f.txt", "same\n")
        .commit("first", date(10))
        .write_file("f.txt", "same\n")
        .commit("second", date(11));

    let handle = executor(settings).build(&spec).unwrap();
    assert_eq!(handle.revisions_created(), 1);
    let skipped: Vec<usize> = handle.skipped().iter().map(|s| s.index).collect();
    assert_eq!(skipped, vec![3]);
}
