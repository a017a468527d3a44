//! Parser for the feed's dynamic rate document.
//!
//! The feed answers a ranged request with one `Record` per published date:
//!
//! ```xml
//! <ValCurs ID="R01235" DateRange1="12.07.2020" DateRange2="15.07.2020">
//!     <Record Date="14.07.2020" Id="R01235"><Nominal>1</Nominal><Value>71,2298</Value></Record>
//!     <Record Date="15.07.2020" Id="R01235"><Nominal>1</Nominal><Value>70,9725</Value></Record>
//! </ValCurs>
//! ```

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::{FxError, FxResult};

const RECORD_TAG: &[u8] = b"Record";
const VALUE_TAG: &[u8] = b"Value";

/// Raw values of the first and last observation of a feed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateRange {
    pub first: String,
    pub last: String,
    /// Number of `Record` elements in the document.
    pub observations: usize,
}

/// Extract the first and last rate observations in document order.
pub fn parse_range(xml: &[u8]) -> FxResult<RateRange> {
    let mut reader = Reader::from_reader(xml);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut records: Vec<Option<String>> = Vec::new();
    let mut in_record = false;
    let mut in_value = false;
    let mut depth = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    RECORD_TAG => {
                        in_record = true;
                        records.push(None);
                    }
                    VALUE_TAG if in_record => in_value = true,
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == RECORD_TAG => records.push(None),
            Ok(Event::Text(t)) if in_value => {
                let text = t.unescape().map_err(|e| {
                    FxError::MalformedFeedDocument(format!(
                        "bad value at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                })?;
                if let Some(slot) = records.last_mut() {
                    *slot = Some(text.trim().to_string());
                }
            }
            Ok(Event::CData(c)) if in_value => {
                let text = reader.decoder().decode(&c).map_err(|e| {
                    FxError::MalformedFeedDocument(format!(
                        "bad value at position {}: {}",
                        reader.buffer_position(),
                        e
                    ))
                })?;
                if let Some(slot) = records.last_mut() {
                    *slot = Some(text.trim().to_string());
                }
            }
            Ok(Event::End(e)) => {
                depth = depth.saturating_sub(1);
                match e.local_name().as_ref() {
                    RECORD_TAG => {
                        in_record = false;
                        in_value = false;
                    }
                    VALUE_TAG => in_value = false,
                    _ => {}
                }
            }
            Ok(Event::Eof) if depth > 0 => {
                return Err(FxError::MalformedFeedDocument(format!(
                    "document truncated with {} unclosed element(s)",
                    depth
                )))
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(FxError::MalformedFeedDocument(format!(
                    "position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    let observations = records.len();
    let first = value_at(&records, 0, "first")?;
    let last = value_at(&records, observations.saturating_sub(1), "last")?;

    Ok(RateRange {
        first,
        last,
        observations,
    })
}

fn value_at(records: &[Option<String>], index: usize, position: &str) -> FxResult<String> {
    match records.get(index) {
        Some(Some(value)) if !value.is_empty() => Ok(value.clone()),
        Some(_) => Err(FxError::MalformedFeedDocument(format!(
            "{} record has no value",
            position
        ))),
        None => Err(FxError::MalformedFeedDocument(
            "document contains no records".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(records: &[(&str, &str)]) -> String {
        let body: String = records
            .iter()
            .map(|(date, value)| {
                format!(
                    r#"<Record Date="{date}" Id="R01235"><Nominal>1</Nominal><Value>{value}</Value></Record>"#
                )
            })
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="windows-1251"?><ValCurs ID="R01235" DateRange1="12.07.2020" DateRange2="15.07.2020" name="Foreign Currency Market Dynamic">{body}</ValCurs>"#
        )
    }

    #[test]
    fn test_first_and_last_in_document_order() {
        let xml = document(&[
            ("15.07.2020", "70,9725"),
            ("14.07.2020", "71,2298"),
            ("16.07.2020", "71,0000"),
        ]);

        let range = parse_range(xml.as_bytes()).unwrap();

        assert_eq!(range.first, "70,9725");
        assert_eq!(range.last, "71,0000");
        assert_eq!(range.observations, 3);
    }

    #[test]
    fn test_single_observation() {
        let xml = document(&[("14.07.2020", "71,2298")]);

        let range = parse_range(xml.as_bytes()).unwrap();

        assert_eq!(range.first, "71,2298");
        assert_eq!(range.last, "71,2298");
        assert_eq!(range.observations, 1);
    }

    #[test]
    fn test_zero_observations_fail() {
        let xml = document(&[]);

        let result = parse_range(xml.as_bytes());

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
        assert!(result.unwrap_err().is_bad_request());
    }

    #[test]
    fn test_record_without_value_fails() {
        let xml = r#"<ValCurs><Record Date="14.07.2020"><Value>71,2298</Value></Record><Record Date="15.07.2020"><Nominal>1</Nominal></Record></ValCurs>"#;

        let result = parse_range(xml.as_bytes());

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
    }

    #[test]
    fn test_value_outside_record_is_ignored() {
        let xml = r#"<ValCurs><Value>1,0</Value><Record><Value>2,0</Value></Record></ValCurs>"#;

        let range = parse_range(xml.as_bytes()).unwrap();

        assert_eq!(range.first, "2,0");
    }

    #[test]
    fn test_truncated_document_fails() {
        let xml = r#"<ValCurs><Record><Value>71,0</Value></Record><Record><Value>70,97"#;

        let result = parse_range(xml.as_bytes());

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
    }

    #[test]
    fn test_cdata_value() {
        let xml = r#"<ValCurs><Record><Value><![CDATA[1,5]]></Value></Record><Record><Value><![CDATA[ 2,5 ]]></Value></Record></ValCurs>"#;

        let range = parse_range(xml.as_bytes()).unwrap();

        assert_eq!(range.first, "1,5");
        assert_eq!(range.last, "2,5");
    }

    #[test]
    fn test_not_xml_fails() {
        let result = parse_range(b"<html><body>Service Unavailable</html>");

        assert!(matches!(result, Err(FxError::MalformedFeedDocument(_))));
    }

    #[test]
    fn test_empty_body_fails() {
        assert!(matches!(
            parse_range(b""),
            Err(FxError::MalformedFeedDocument(_))
        ));
    }
}
