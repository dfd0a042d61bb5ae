use crate::error::{VcsError, VcsResult};
use crate::history::{
    parse_epoch, split_message, split_records, ChangeStatus, CommitRecord, FileChange,
    FIELD_END, FILE_SEPARATOR,
};

/// Parent of a root changeset
const NULL_NODE: &str = "0000000000000000000000000000000000000000";

/// node, p1, p2, person, email, date, description, adds, dels, copies, mods
const FIELD_COUNT: usize = 11;

/// `--template` arguments; Mercurial expands the `\xNN` escapes itself
pub fn log_format() -> Vec<String> {
    let start = r"\x15\x16\x17\x18\x19";
    let end = r"\x19\x18\x17\x16\x15";
    let files = r"\x17\x16\x15\x19\x18";
    let template = format!(
        "{start}{{node}}{end}{{p1node}}{end}{{p2node}}{end}{{author|person}}{end}\
         {{author|email}}{end}{{date|hgdate}}{end}{{desc}}{end}\
         {{join(file_adds,'{files}')}}{end}{{join(file_dels,'{files}')}}{end}\
         {{join(file_copies,'{files}')}}{end}{{join(file_mods,'{files}')}}{end}"
    );
    vec!["--template".to_string(), template]
}

/// Parse `hg log` output produced with [`log_format`]
pub fn parse_log(raw: &str) -> VcsResult<Vec<CommitRecord>> {
    split_records(raw)?.into_iter().map(parse_record).collect()
}

fn parse_record(text: &str) -> VcsResult<CommitRecord> {
    let fields: Vec<&str> = text.split(FIELD_END).collect();
    // Every field is terminated, so the last piece is whatever follows the record
    if fields.len() != FIELD_COUNT + 1 || !fields[FIELD_COUNT].trim().is_empty() {
        return Err(VcsError::Parse(format!(
            "hg log record has {} fields, expected {}",
            fields.len().saturating_sub(1),
            FIELD_COUNT
        )));
    }

    let id = fields[0].trim();
    if id.is_empty() {
        return Err(VcsError::Parse("hg log record without a node".to_string()));
    }

    let parents = [fields[1], fields[2]]
        .iter()
        .map(|node| node.trim())
        .filter(|node| !node.is_empty() && *node != NULL_NODE)
        .map(String::from)
        .collect();

    let date = parse_hgdate(fields[5])?;
    let (subject, body) = split_message(fields[6]);

    Ok(CommitRecord {
        id: id.to_string(),
        parents,
        author_name: fields[3].to_string(),
        author_email: fields[4].to_string(),
        author_time: date,
        committer_time: date,
        subject,
        body,
        changes: collect_changes(fields[7], fields[8], fields[9], fields[10])?,
    })
}

/// `<unixtime> <offset>`; the timestamp is already UTC
fn parse_hgdate(value: &str) -> VcsResult<chrono::DateTime<chrono::Utc>> {
    let seconds = value
        .split_whitespace()
        .next()
        .ok_or_else(|| VcsError::Parse(format!("invalid hg date: '{}'", value)))?;
    parse_epoch(seconds)
}

fn files(field: &str) -> impl Iterator<Item = &str> {
    field.split(FILE_SEPARATOR).filter(|name| !name.is_empty())
}

/// Merge the add/delete/copy/modify lists into one change list
///
/// A copy whose source is deleted in the same changeset is a rename or move.
/// Any other copy is reported as an added file carrying its source.
fn collect_changes(adds: &str, dels: &str, copies: &str, mods: &str) -> VcsResult<Vec<FileChange>> {
    let mut added: Vec<&str> = files(adds).collect();
    let mut deleted: Vec<&str> = files(dels).collect();
    let mut relocations = Vec::new();

    for copy in files(copies) {
        let (to, from) = parse_copy(copy)?;
        added.retain(|path| *path != to);
        if let Some(index) = deleted.iter().position(|path| *path == from) {
            deleted.remove(index);
            relocations.push(FileChange::relocated(from, to));
        } else {
            relocations.push(FileChange::copied(from, to));
        }
    }

    let mut changes: Vec<FileChange> = added
        .into_iter()
        .map(|path| FileChange::new(ChangeStatus::Added, path))
        .collect();
    changes.extend(
        deleted
            .into_iter()
            .map(|path| FileChange::new(ChangeStatus::Deleted, path)),
    );
    changes.extend(relocations);
    changes.extend(files(mods).map(|path| FileChange::new(ChangeStatus::Modified, path)));
    Ok(changes)
}

/// `file_copies` entries read `new (old)`
fn parse_copy(entry: &str) -> VcsResult<(&str, &str)> {
    entry
        .strip_suffix(')')
        .and_then(|rest| rest.rsplit_once(" ("))
        .ok_or_else(|| VcsError::Parse(format!("invalid hg copy entry: {}", entry)))
}
