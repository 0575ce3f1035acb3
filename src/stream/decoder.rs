use csv::{ReaderBuilder, StringRecord};
use std::io;

use super::types::{Record, StreamError, StreamResult};

/// Parse one line as a single CSV record.
///
/// An empty line yields an empty field list. Quoting follows the usual CSV
/// rules; a line break inside quotes cannot occur since input is already
/// split on newlines. A trailing `\r` is accepted, but an unquoted `\r`
/// that splits the line into more than one record is an error.
pub fn decode_line(line: &[u8]) -> Result<Vec<String>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .buffer_capacity(line.len().max(64))
        .from_reader(line);

    let mut record = StringRecord::new();
    if !reader.read_record(&mut record)? {
        return Ok(Vec::new());
    }
    let fields: Vec<String> = record.iter().map(str::to_string).collect();

    if reader.read_record(&mut record)? {
        return Err(csv::Error::from(io::Error::new(
            io::ErrorKind::InvalidData,
            "new-line character seen in unquoted field",
        )));
    }
    Ok(fields)
}

/// Decode a batch of raw lines, pairing fields with `header` when present.
///
/// Header pairing is positional and stops at the shorter of the two
/// sequences. The whole batch fails on the first malformed line.
pub fn decode_batch<L: AsRef<[u8]>>(
    lines: &[L],
    header: Option<&[String]>,
) -> StreamResult<Vec<Record>> {
    // An empty header row names nothing; rows stay plain field lists
    let header = header.filter(|names| !names.is_empty());
    lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let fields = decode_line(line.as_ref()).map_err(|e| StreamError::Decode {
                line: index + 1,
                message: e.to_string(),
            })?;
            Ok(match header {
                Some(names) => Record::Named(zip_with_header(names, fields)),
                None => Record::Fields(fields),
            })
        })
        .collect()
}

fn zip_with_header(names: &[String], fields: Vec<String>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::with_capacity(names.len().min(fields.len()));
    for (name, value) in names.iter().zip(fields) {
        // Repeated header names: later column wins, first position is kept
        match pairs.iter_mut().find(|(key, _)| key == name) {
            Some(existing) => existing.1 = value,
            None => pairs.push((name.clone(), value)),
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_plain_fields() {
        assert_eq!(decode_line(b"1,2,3").unwrap(), strings(&["1", "2", "3"]));
    }

    #[test]
    fn test_quoted_fields() {
        let fields = decode_line(br#"a,"b, with comma","say ""hi""""#).unwrap();
        assert_eq!(fields, strings(&["a", "b, with comma", r#"say "hi""#]));
    }

    #[test]
    fn test_empty_line_and_empty_fields() {
        assert!(decode_line(b"").unwrap().is_empty());
        assert_eq!(decode_line(b",,").unwrap(), strings(&["", "", ""]));
    }

    #[test]
    fn test_carriage_return_is_stripped() {
        assert_eq!(decode_line(b"x,y\r").unwrap(), strings(&["x", "y"]));
    }

    #[test]
    fn test_bare_carriage_return_is_rejected() {
        assert!(decode_line(b"a,b\rc,d").is_err());
        assert_eq!(decode_line(b"\"a\rb\",c").unwrap(), strings(&["a\rb", "c"]));

        let lines = vec![b"1,2".to_vec(), b"3,4\r5,6\r7,8".to_vec()];
        match decode_batch(&lines, None) {
            Err(StreamError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_header_yields_plain_fields() {
        let header: Vec<String> = Vec::new();
        let records = decode_batch(&[b"1,2".to_vec()], Some(header.as_slice())).unwrap();
        assert_eq!(records, vec![Record::Fields(strings(&["1", "2"]))]);
    }

    #[test]
    fn test_batch_without_header() {
        let records = decode_batch(&[b"1,2".as_slice(), b"3".as_slice()], None).unwrap();
        assert_eq!(
            records,
            vec![
                Record::Fields(strings(&["1", "2"])),
                Record::Fields(strings(&["3"])),
            ]
        );
    }

    #[test]
    fn test_header_zip_drops_extra_fields() {
        let header = strings(&["a", "b"]);
        let records = decode_batch(&[b"1,2,3".to_vec()], Some(header.as_slice())).unwrap();
        assert_eq!(
            records[0],
            Record::Named(vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ])
        );
    }

    #[test]
    fn test_header_zip_short_row() {
        let header = strings(&["h1", "h2"]);
        let records = decode_batch(&[b"5".to_vec()], Some(header.as_slice())).unwrap();
        assert_eq!(records[0].get("h1"), Some("5"));
        assert_eq!(records[0].get("h2"), None);
        assert_eq!(records[0].len(), 1);
    }

    #[test]
    fn test_duplicate_header_names() {
        let header = strings(&["k", "v", "k"]);
        let records = decode_batch(&[b"1,2,3".to_vec()], Some(header.as_slice())).unwrap();
        assert_eq!(
            records[0],
            Record::Named(vec![
                ("k".to_string(), "3".to_string()),
                ("v".to_string(), "2".to_string()),
            ])
        );
    }

    #[test]
    fn test_invalid_utf8_rejects_batch() {
        let lines = vec![b"ok,fine".to_vec(), vec![b'a', b',', 0xff, 0xfe]];
        match decode_batch(&lines, None) {
            Err(StreamError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
