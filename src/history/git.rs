use crate::error::{VcsError, VcsResult};
use crate::history::{
    parse_epoch, split_message, split_records, ChangeStatus, CommitRecord, FileChange, FIELD_END,
};

/// Fields per record: hash, parents, author name, author email,
/// author time, committer time, raw message, name-status block
const FIELD_COUNT: usize = 8;

pub fn log_format() -> Vec<String> {
    let start = "%x15%x16%x17%x18%x19";
    let end = "%x19%x18%x17%x16%x15";
    vec![
        "--date-order".to_string(),
        "--encoding=UTF-8".to_string(),
        "--name-status".to_string(),
        "-M".to_string(),
        format!("--pretty=format:{start}%H{end}%P{end}%an{end}%ae{end}%at{end}%ct{end}%B{end}"),
    ]
}

/// Parse `git log` output produced with [`log_format`]
pub fn parse_log(raw: &str) -> VcsResult<Vec<CommitRecord>> {
    split_records(raw)?.into_iter().map(parse_record).collect()
}

fn parse_record(text: &str) -> VcsResult<CommitRecord> {
    let fields: Vec<&str> = text.split(FIELD_END).collect();
    if fields.len() != FIELD_COUNT {
        return Err(VcsError::Parse(format!(
            "git log record has {} fields, expected {}",
            fields.len(),
            FIELD_COUNT
        )));
    }

    let id = fields[0].trim();
    if id.is_empty() {
        return Err(VcsError::Parse("git log record without a commit hash".to_string()));
    }

    let (subject, body) = split_message(fields[6]);
    let changes = fields[7]
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(parse_change)
        .collect::<VcsResult<Vec<_>>>()?;

    Ok(CommitRecord {
        id: id.to_string(),
        parents: fields[1].split_whitespace().map(String::from).collect(),
        author_name: fields[2].to_string(),
        author_email: fields[3].to_string(),
        author_time: parse_epoch(fields[4])?,
        committer_time: parse_epoch(fields[5])?,
        subject,
        body,
        changes,
    })
}

/// Parse one `--name-status` line, e.g. `M\tfile.txt` or `R100\told\tnew`
fn parse_change(line: &str) -> VcsResult<FileChange> {
    let mut parts = line.split('\t');
    let status = parts.next().unwrap_or("");
    let first = parts
        .next()
        .ok_or_else(|| VcsError::Parse(format!("name-status line without a path: {}", line)))?;
    let first = unquote(first)?;
    let second = parts.next().map(unquote).transpose()?;

    let change = match (status.chars().next(), second) {
        (Some('A'), None) => FileChange::new(ChangeStatus::Added, first),
        (Some('M' | 'T' | 'U' | 'X'), None) => FileChange::new(ChangeStatus::Modified, first),
        (Some('D'), None) => FileChange::new(ChangeStatus::Deleted, first),
        (Some('R'), Some(to)) => FileChange::relocated(first, to),
        (Some('C'), Some(to)) => FileChange::copied(first, to),
        _ => {
            return Err(VcsError::Parse(format!(
                "unknown git change type '{}' in: {}",
                status, line
            )));
        }
    };
    Ok(change)
}

/// Undo git's C-style quoting of unusual path names
///
/// With `core.quotepath=off` non-ASCII bytes come through verbatim, but
/// quotes, backslashes and control characters are still escaped.
fn unquote(path: &str) -> VcsResult<String> {
    let Some(inner) = path
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return Ok(path.to_string());
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes();
    while let Some(byte) = iter.next() {
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let escaped = match iter.next() {
            Some(b'a') => 0x07,
            Some(b'b') => 0x08,
            Some(b't') => b'\t',
            Some(b'n') => b'\n',
            Some(b'v') => 0x0b,
            Some(b'f') => 0x0c,
            Some(b'r') => b'\r',
            Some(b'"') => b'"',
            Some(b'\\') => b'\\',
            Some(high @ b'0'..=b'3') => {
                let mid = octal_digit(iter.next(), path)?;
                let low = octal_digit(iter.next(), path)?;
                ((high - b'0') << 6) | (mid << 3) | low
            }
            _ => {
                return Err(VcsError::Parse(format!("invalid escape in path: {}", path)));
            }
        };
        bytes.push(escaped);
    }

    String::from_utf8(bytes)
        .map_err(|_| VcsError::Parse(format!("path is not valid UTF-8: {}", path)))
}

fn octal_digit(byte: Option<u8>, path: &str) -> VcsResult<u8> {
    match byte {
        Some(digit @ b'0'..=b'7') => Ok(digit - b'0'),
        _ => Err(VcsError::Parse(format!("invalid octal escape in path: {}", path))),
    }
}
