//! OSM change document (`osmChange`) parsing
//!
//! The classifier produces typed [`Element`] values at parse time: the
//! document is walked once into a list of [`ChangeEntry`] items which the
//! processor phases iterate. Files with a `.gz` suffix are gunzipped first.

use crate::changeset::ChangeAction;
use crate::error::{EngineError, EngineResult};
use flate2::read::GzDecoder;
use osmsync_core::model::{Node, OsmId, OsmKind, Relation, RelationMember, Way};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::Read;
use std::path::Path;

/// One typed OSM element from the change document.
#[derive(Debug, Clone)]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Element {
    pub fn kind(&self) -> OsmKind {
        match self {
            Element::Node(_) => OsmKind::Node,
            Element::Way(_) => OsmKind::Way,
            Element::Relation(_) => OsmKind::Relation,
        }
    }

    pub fn id(&self) -> OsmId {
        match self {
            Element::Node(n) => n.id(),
            Element::Way(w) => w.id(),
            Element::Relation(r) => r.id(),
        }
    }

    pub fn to_osm_xml(&self) -> String {
        match self {
            Element::Node(n) => n.to_osm_xml(),
            Element::Way(w) => w.to_osm_xml(),
            Element::Relation(r) => r.to_osm_xml(),
        }
    }
}

/// An element together with the section (`create`/`modify`/`delete`) it
/// appeared in.
#[derive(Debug, Clone)]
pub struct ChangeEntry {
    pub action: ChangeAction,
    pub element: Element,
}

/// Read and parse a change file; `.gz` files are decompressed first.
pub fn parse_change_file(path: &Path) -> EngineResult<Vec<ChangeEntry>> {
    let bytes = std::fs::read(path)?;
    let text = if path.extension().is_some_and(|ext| ext == "gz") {
        let mut out = String::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_string(&mut out)
            .map_err(|e| EngineError::Decompression(format!("{}: {e}", path.display())))?;
        out
    } else {
        String::from_utf8(bytes)
            .map_err(|e| EngineError::MalformedChangeFile(format!("{}: {e}", path.display())))?
    };
    parse_change_document(&text)
}

/// Parse an `osmChange` document into typed entries.
pub fn parse_change_document(xml: &str) -> EngineResult<Vec<ChangeEntry>> {
    let mut reader = Reader::from_str(xml);

    let mut entries = Vec::new();
    let mut action: Option<ChangeAction> = None;
    let mut current: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(event @ (Event::Start(_) | Event::Empty(_))) => {
                let (e, is_empty) = match &event {
                    Event::Start(e) => (e, false),
                    Event::Empty(e) => (e, true),
                    _ => unreachable!(),
                };
                match e.local_name().as_ref() {
                    b"modify" => action = Some(ChangeAction::Modify),
                    b"create" => action = Some(ChangeAction::Create),
                    b"delete" => action = Some(ChangeAction::Delete),
                    b"node" | b"way" | b"relation" => {
                        let Some(section) = action else {
                            // elements outside change sections are not part
                            // of the diff
                            continue;
                        };
                        let element = start_element(e)?;
                        if is_empty {
                            entries.push(ChangeEntry {
                                action: section,
                                element,
                            });
                        } else {
                            current = Some(element);
                        }
                    }
                    b"nd" => {
                        let node_ref = required_attr(e, b"ref")?.parse::<OsmId>().map_err(|_| {
                            malformed("nd element with non-numeric ref attribute")
                        })?;
                        match current.as_mut() {
                            Some(Element::Way(way)) => way.add_member(node_ref),
                            // legacy shape: nd children of a relation are
                            // node references with an empty role
                            Some(Element::Relation(rel)) => {
                                rel.add_member(RelationMember::new(OsmKind::Node, node_ref, ""))
                            }
                            _ => return Err(malformed("nd element outside way or relation")),
                        }
                    }
                    b"member" => {
                        let Some(Element::Relation(rel)) = current.as_mut() else {
                            return Err(malformed("member element outside relation"));
                        };
                        let kind_name = required_attr(e, b"type")?;
                        let kind = OsmKind::from_str_opt(&kind_name).ok_or_else(|| {
                            malformed(&format!("member with unknown type '{kind_name}'"))
                        })?;
                        let member_ref =
                            required_attr(e, b"ref")?.parse::<OsmId>().map_err(|_| {
                                malformed("member element with non-numeric ref attribute")
                            })?;
                        let role = attr(e, b"role")?.unwrap_or_default();
                        rel.add_member(RelationMember::new(kind, member_ref, &role));
                    }
                    b"tag" => {
                        let key = required_attr(e, b"k")?;
                        let value = required_attr(e, b"v")?;
                        match current.as_mut() {
                            Some(Element::Node(n)) => n.add_tag(&key, &value),
                            Some(Element::Way(w)) => w.add_tag(&key, &value),
                            Some(Element::Relation(r)) => r.add_tag(&key, &value),
                            None => return Err(malformed("tag element outside OSM element")),
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"modify" | b"create" | b"delete" => action = None,
                b"node" | b"way" | b"relation" => {
                    if let Some(element) = current.take() {
                        let section = action
                            .ok_or_else(|| malformed("element closed outside change section"))?;
                        entries.push(ChangeEntry {
                            action: section,
                            element,
                        });
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(EngineError::MalformedChangeFile(e.to_string())),
        }
    }

    Ok(entries)
}

fn start_element(e: &BytesStart<'_>) -> EngineResult<Element> {
    let id = required_attr(e, b"id")?
        .parse::<OsmId>()
        .map_err(|_| malformed("element with non-numeric id attribute"))?;
    let timestamp = attr(e, b"timestamp")?;

    let element = match e.local_name().as_ref() {
        b"node" => {
            let mut node = Node::new(id);
            if let (Some(lat), Some(lon)) = (attr(e, b"lat")?, attr(e, b"lon")?) {
                node.set_position(&lat, &lon);
            }
            if let Some(ts) = timestamp {
                node.set_timestamp(&ts);
            }
            Element::Node(node)
        }
        b"way" => {
            let mut way = Way::new(id);
            if let Some(ts) = timestamp {
                way.set_timestamp(&ts);
            }
            Element::Way(way)
        }
        b"relation" => {
            let mut relation = Relation::new(id);
            if let Some(ts) = timestamp {
                relation.set_timestamp(&ts);
            }
            Element::Relation(relation)
        }
        other => {
            return Err(malformed(&format!(
                "unexpected element '{}'",
                String::from_utf8_lossy(other)
            )));
        }
    };
    Ok(element)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> EngineResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| malformed(&format!("bad attribute: {err}")))?;
        if attr.key.local_name().as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| malformed(&format!("bad attribute value: {err}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(e: &BytesStart<'_>, name: &[u8]) -> EngineResult<String> {
    attr(e, name)?.ok_or_else(|| {
        malformed(&format!(
            "element missing required attribute '{}'",
            String::from_utf8_lossy(name)
        ))
    })
}

fn malformed(message: &str) -> EngineError {
    EngineError::MalformedChangeFile(message.to_string())
}
