use crate::error::{VcsError, VcsResult};
use crate::history::{split_message, ChangeStatus, CommitRecord, FileChange};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;

pub fn log_format() -> Vec<String> {
    vec!["--xml".to_string(), "--verbose".to_string()]
}

/// One `<path>` element of a log entry
#[derive(Debug, Default)]
struct ChangedPath {
    action: String,
    kind: Option<String>,
    copy_from: Option<String>,
    text_mods: Option<String>,
    prop_mods: Option<String>,
    path: String,
}

impl ChangedPath {
    fn from_element(element: &BytesStart<'_>) -> VcsResult<Self> {
        Ok(Self {
            action: attribute(element, "action")?.unwrap_or_default(),
            kind: attribute(element, "kind")?,
            copy_from: attribute(element, "copyfrom-path")?.map(|p| relative(&p).to_string()),
            text_mods: attribute(element, "text-mods")?,
            prop_mods: attribute(element, "prop-mods")?,
            path: String::new(),
        })
    }

    fn is_file(&self) -> bool {
        matches!(self.kind.as_deref(), None | Some("") | Some("file"))
    }

    /// Older servers omit `text-mods`; treat that as a content change
    /// unless only properties changed
    fn has_text_change(&self) -> bool {
        match self.text_mods.as_deref() {
            Some(value) => value == "true",
            None => self.prop_mods.as_deref() != Some("true"),
        }
    }
}

#[derive(Debug, Default)]
struct Entry {
    revision: u64,
    author: String,
    date: Option<DateTime<Utc>>,
    message: String,
    paths: Vec<ChangedPath>,
}

impl Entry {
    fn finish(self) -> VcsResult<CommitRecord> {
        let date = self.date.ok_or_else(|| {
            VcsError::Parse(format!("svn log entry {} has no date", self.revision))
        })?;
        let (subject, body) = split_message(&self.message);
        let parents = if self.revision > 1 {
            vec![(self.revision - 1).to_string()]
        } else {
            Vec::new()
        };

        Ok(CommitRecord {
            id: self.revision.to_string(),
            parents,
            author_name: self.author,
            author_email: String::new(),
            author_time: date,
            committer_time: date,
            subject,
            body,
            changes: collect_changes(&self.paths)?,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Capture {
    Author,
    Date,
    Message,
    Path,
}

/// Parse `svn log --xml --verbose` output
pub fn parse_log(xml: &str) -> VcsResult<Vec<CommitRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut records = Vec::new();
    let mut entry: Option<Entry> = None;
    let mut path: Option<ChangedPath> = None;
    let mut capture: Option<Capture> = None;
    let mut text = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            VcsError::Parse(format!(
                "invalid svn log XML at byte {}: {}",
                reader.buffer_position(),
                e
            ))
        })?;

        match event {
            Event::Start(element) => {
                match element.name().as_ref() {
                    b"logentry" => entry = Some(new_entry(&element)?),
                    b"author" => capture = Some(Capture::Author),
                    b"date" => capture = Some(Capture::Date),
                    b"msg" => capture = Some(Capture::Message),
                    b"path" => {
                        path = Some(ChangedPath::from_element(&element)?);
                        capture = Some(Capture::Path);
                    }
                    _ => {}
                }
                text.clear();
            }
            Event::Empty(element) => {
                // A revision with no properties at all, e.g. revision 0
                if element.name().as_ref() == b"logentry" {
                    records.push(new_entry(&element)?.finish()?);
                }
            }
            Event::Text(content) if capture.is_some() => {
                let unescaped = content
                    .unescape()
                    .map_err(|e| VcsError::Parse(format!("invalid svn log text: {}", e)))?;
                text.push_str(&unescaped);
            }
            Event::End(element) => {
                let name = element.name();
                let name = name.as_ref();
                if name == b"logentry" {
                    let finished = entry.take().ok_or_else(|| {
                        VcsError::Parse("unbalanced <logentry> in svn log".to_string())
                    })?;
                    records.push(finished.finish()?);
                } else if let (Some(current), Some(field)) = (entry.as_mut(), capture) {
                    let value = std::mem::take(&mut text);
                    match (field, name) {
                        (Capture::Author, b"author") => current.author = value,
                        (Capture::Date, b"date") => current.date = Some(parse_date(&value)?),
                        (Capture::Message, b"msg") => current.message = value,
                        (Capture::Path, b"path") => {
                            if let Some(mut changed) = path.take() {
                                changed.path = relative(value.trim()).to_string();
                                current.paths.push(changed);
                            }
                        }
                        _ => {}
                    }
                    capture = None;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if entry.is_some() {
        return Err(VcsError::Parse("svn log ended inside a <logentry>".to_string()));
    }
    Ok(records)
}

fn new_entry(element: &BytesStart<'_>) -> VcsResult<Entry> {
    let revision = attribute(element, "revision")?
        .ok_or_else(|| VcsError::Parse("svn log entry without a revision".to_string()))?;
    let revision = revision
        .parse::<u64>()
        .map_err(|_| VcsError::Parse(format!("invalid svn revision: {}", revision)))?;
    Ok(Entry {
        revision,
        ..Entry::default()
    })
}

fn attribute(element: &BytesStart<'_>, name: &str) -> VcsResult<Option<String>> {
    let attr = element
        .try_get_attribute(name)
        .map_err(|e| VcsError::Parse(format!("invalid attribute '{}': {}", name, e)))?;
    attr.map(|attr| {
        attr.unescape_value()
            .map(|value| value.into_owned())
            .map_err(|e| VcsError::Parse(format!("invalid attribute '{}': {}", name, e)))
    })
    .transpose()
}

fn parse_date(value: &str) -> VcsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| VcsError::Parse(format!("invalid svn date '{}': {}", value.trim(), e)))
}

/// Repository paths start at the root, `/folder1/file1.txt`
fn relative(path: &str) -> &str {
    path.trim_start_matches('/')
}

/// Turn changed paths into file changes
///
/// An added path copied from a path deleted in the same revision is a rename
/// or move. `R` (replaced) reads as a deletion plus an addition. Directory
/// entries are skipped since only files are compared.
fn collect_changes(paths: &[ChangedPath]) -> VcsResult<Vec<FileChange>> {
    let deleted: HashSet<&str> = paths
        .iter()
        .filter(|p| p.action == "D")
        .map(|p| p.path.as_str())
        .collect();
    let relocated: HashSet<&str> = paths
        .iter()
        .filter(|p| p.action == "A" && p.is_file())
        .filter_map(|p| p.copy_from.as_deref())
        .filter(|from| deleted.contains(from))
        .collect();

    let mut changes = Vec::new();
    for changed in paths.iter().filter(|p| p.is_file()) {
        let path = changed.path.as_str();
        match (changed.action.as_str(), changed.copy_from.as_deref()) {
            ("A", Some(from)) if relocated.contains(from) => {
                changes.push(FileChange::relocated(from, path));
            }
            ("A", Some(from)) => changes.push(FileChange::copied(from, path)),
            ("A", None) => changes.push(FileChange::new(ChangeStatus::Added, path)),
            ("D", _) if relocated.contains(path) => {}
            ("D", _) => changes.push(FileChange::new(ChangeStatus::Deleted, path)),
            ("M", _) => {
                if changed.has_text_change() {
                    changes.push(FileChange::new(ChangeStatus::Modified, path));
                }
            }
            ("R", _) => {
                changes.push(FileChange::new(ChangeStatus::Deleted, path));
                changes.push(FileChange::new(ChangeStatus::Added, path));
            }
            (action, _) => {
                return Err(VcsError::Parse(format!(
                    "unknown svn action '{}' for {}",
                    action, path
                )));
            }
        }
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const LOG: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry
   revision="2">
<author>Some Author</author>
<date>2014-08-11T15:00:00.000000Z</date>
<paths>
<path
   text-mods="true"
   kind="file"
   action="A"
   prop-mods="false">/file2.txt</path>
<path
   kind="file"
   action="M"
   prop-mods="false"
   text-mods="true">/file1.txt</path>
</paths>
<msg>added file2 &amp; modified file1</msg>
</logentry>
<logentry
   revision="1">
<author>Some Author</author>
<date>2014-08-10T15:00:00.000000Z</date>
<paths>
<path
   action="A"
   prop-mods="false"
   text-mods="true"
   kind="file">/file1.txt</path>
</paths>
<msg>initial commit</msg>
</logentry>
</log>
"#;

    #[test]
    fn test_parse_two_revisions() {
        let records = parse_log(LOG).unwrap();
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].id, "2");
        assert_eq!(records[0].parents, vec!["1".to_string()]);
        assert_eq!(records[0].author_name, "Some Author");
        assert_eq!(records[0].author_email, "");
        assert_eq!(records[0].subject, "added file2 & modified file1");
        assert_eq!(
            records[0].changes,
            vec![
                FileChange::new(ChangeStatus::Added, "file2.txt"),
                FileChange::new(ChangeStatus::Modified, "file1.txt"),
            ]
        );

        assert!(records[1].is_root());
        assert_eq!(
            records[1].committer_time.to_rfc3339(),
            "2014-08-10T15:00:00+00:00"
        );
        assert_eq!(records[1].author_time, records[1].committer_time);
    }

    #[test]
    fn test_move_and_directory_entries() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<log>
<logentry revision="5">
<author>Some Author</author>
<date>2014-08-14T15:00:00.000000Z</date>
<paths>
<path action="A" kind="dir" text-mods="false" prop-mods="false">/folder2</path>
<path action="A" kind="file" copyfrom-path="/folder1/file1.txt" copyfrom-rev="4" text-mods="false" prop-mods="false">/folder2/renamed_file1.txt</path>
<path action="D" kind="file" text-mods="false" prop-mods="false">/folder1/file1.txt</path>
<path action="M" kind="file" text-mods="true" prop-mods="false">/file2.txt</path>
<path action="A" kind="file" copyfrom-path="/file2.txt" copyfrom-rev="4" text-mods="false" prop-mods="false">/copy.txt</path>
</paths>
<msg>moved and renamed file1</msg>
</logentry>
</log>"#;

        let records = parse_log(xml).unwrap();
        assert_eq!(
            records[0].changes,
            vec![
                FileChange::relocated("folder1/file1.txt", "folder2/renamed_file1.txt"),
                FileChange::new(ChangeStatus::Modified, "file2.txt"),
                FileChange::copied("file2.txt", "copy.txt"),
            ]
        );
        assert_eq!(records[0].changes[0].status, ChangeStatus::Moved);
    }

    #[test]
    fn test_property_only_change_is_not_modified() {
        let xml = r#"<log><logentry revision="3"><author>A</author><date>2014-08-12T15:00:00.000000Z</date><paths><path action="M" kind="file" text-mods="false" prop-mods="true">/file1.txt</path></paths><msg>props</msg></logentry></log>"#;
        let records = parse_log(xml).unwrap();
        assert!(records[0].changes.is_empty());
    }

    #[test]
    fn test_multiline_message_and_replace() {
        let xml = "<log><logentry revision=\"4\"><author>A</author><date>2014-08-13T15:00:00.000000Z</date><paths><path action=\"R\" kind=\"file\">/file3.txt</path></paths><msg>subject line\n\nbody text\n</msg></logentry></log>";
        let records = parse_log(xml).unwrap();
        assert_eq!(records[0].subject, "subject line");
        assert_eq!(records[0].body, "body text");
        assert_eq!(
            records[0].changes,
            vec![
                FileChange::new(ChangeStatus::Deleted, "file3.txt"),
                FileChange::new(ChangeStatus::Added, "file3.txt"),
            ]
        );
    }

    #[test]
    fn test_malformed_logs() {
        assert!(parse_log("<log><logentry><msg>x</msg></logentry></log>").is_err());
        assert!(parse_log("<log><logentry revision=\"abc\"></logentry></log>").is_err());
        assert!(parse_log("<log><logentry revision=\"1\"><date>yesterday</date></logentry></log>").is_err());
        assert!(parse_log("<log><logentry revision=\"1\"><msg>open").is_err());
        assert!(matches!(
            parse_log("<log><logentry revision=\"1\"><author>A</author><msg>m</msg></logentry></log>"),
            Err(VcsError::Parse(message)) if message.contains("no date")
        ));
    }

    #[test]
    fn test_empty_log() {
        let records = parse_log("<?xml version=\"1.0\"?>\n<log>\n</log>\n").unwrap();
        assert!(records.is_empty());
    }
}
