//! SPARQL results XML (`application/sparql-results+xml`) parsing
//!
//! Walks `sparql/results/result/binding` and collects each result row as a
//! binding-name → value map. Term kind is irrelevant to the engine: IRIs,
//! literals and blank nodes all surface as their lexical value.

use crate::error::{EngineError, EngineResult};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;

/// One result row: binding name → value.
pub type Row = HashMap<String, String>;

/// Parse a SELECT results document into rows.
pub fn parse_select(xml: &str) -> EngineResult<Vec<Row>> {
    let mut reader = Reader::from_str(xml);

    let mut rows: Vec<Row> = Vec::new();
    let mut current_row: Option<Row> = None;
    let mut current_binding: Option<String> = None;
    let mut in_term = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(event @ (Event::Start(_) | Event::Empty(_))) => {
                let (e, is_empty) = match &event {
                    Event::Start(e) => (e, false),
                    Event::Empty(e) => (e, true),
                    _ => unreachable!(),
                };
                match e.local_name().as_ref() {
                    b"result" => current_row = Some(Row::new()),
                    b"binding" => {
                        current_binding = None;
                        for attr in e.attributes().flatten() {
                            if attr.key.local_name().as_ref() == b"name" {
                                current_binding =
                                    Some(String::from_utf8_lossy(&attr.value).into_owned());
                            }
                        }
                        if current_binding.is_none() {
                            return Err(EngineError::MalformedResponse(
                                "binding element without name attribute".to_string(),
                            ));
                        }
                    }
                    b"uri" | b"literal" | b"bnode" => {
                        if is_empty {
                            // self-closing term, e.g. an empty GROUP_CONCAT literal
                            let name = current_binding.clone().ok_or_else(|| {
                                EngineError::MalformedResponse("term outside binding".to_string())
                            })?;
                            let row = current_row.as_mut().ok_or_else(|| {
                                EngineError::MalformedResponse(
                                    "binding outside result".to_string(),
                                )
                            })?;
                            row.insert(name, String::new());
                        } else {
                            in_term = true;
                            text.clear();
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(e)) => {
                if in_term {
                    let value = e.unescape().map_err(|err| {
                        EngineError::MalformedResponse(format!("bad character data: {err}"))
                    })?;
                    text.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"uri" | b"literal" | b"bnode" => {
                    in_term = false;
                    let name = current_binding.clone().ok_or_else(|| {
                        EngineError::MalformedResponse("term outside binding".to_string())
                    })?;
                    let row = current_row.as_mut().ok_or_else(|| {
                        EngineError::MalformedResponse("binding outside result".to_string())
                    })?;
                    row.insert(name, std::mem::take(&mut text));
                }
                b"result" => {
                    if let Some(row) = current_row.take() {
                        rows.push(row);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(EngineError::MalformedResponse(format!(
                    "invalid results XML: {e}"
                )));
            }
        }
    }

    Ok(rows)
}

/// Fetch a required binding from a row.
pub fn required<'a>(row: &'a Row, name: &str) -> EngineResult<&'a str> {
    row.get(name).map(String::as_str).ok_or_else(|| {
        EngineError::MalformedResponse(format!("expected binding '{name}' missing from result"))
    })
}
