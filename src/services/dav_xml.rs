//! WebDAV XML bodies: the multistatus writer and the PROPFIND/PROPPATCH
//! request parsers.
//!
//! Only local element names are significant. Namespace prefixes on inbound
//! bodies are accepted and ignored, and outbound bodies put everything in
//! the `DAV:` default namespace.

use crate::models::properties::DavProperties;
use quick_xml::{Reader, escape::escape, events::Event};
use thiserror::Error;

const STATUS_OK: &str = "HTTP/1.1 200 OK";
const STATUS_FORBIDDEN: &str = "HTTP/1.1 403 Forbidden";
const STATUS_NOT_FOUND: &str = "HTTP/1.1 404 Not Found";
const STATUS_FAILED_DEPENDENCY: &str = "HTTP/1.1 424 Failed Dependency";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("malformed XML body: {0}")]
    Malformed(String),
    #[error("expected a <{expected}> document, found <{found}>")]
    UnexpectedRoot {
        expected: &'static str,
        found: String,
    },
}

/// What a PROPFIND asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropfindRequest {
    AllProp,
    PropName,
    Prop(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchAction {
    Set,
    Remove,
}

/// Result of one PROPPATCH instruction.
///
/// Updates are all-or-nothing: one protected property fails the others
/// with [`PatchOutcome::FailedDependency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Applied,
    Protected,
    FailedDependency,
}

impl PatchOutcome {
    fn status(self) -> &'static str {
        match self {
            Self::Applied => STATUS_OK,
            Self::Protected => STATUS_FORBIDDEN,
            Self::FailedDependency => STATUS_FAILED_DEPENDENCY,
        }
    }
}

/// One instruction from a PROPPATCH body, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropPatchOp {
    pub action: PatchAction,
    pub name: String,
    pub value: String,
}

fn local_name(name: &[u8]) -> String {
    String::from_utf8_lossy(name).into_owned()
}

fn malformed(err: impl std::fmt::Display) -> XmlError {
    XmlError::Malformed(err.to_string())
}

/// Parse a PROPFIND body. An empty body means `allprop`.
pub fn parse_propfind(body: &[u8]) -> Result<PropfindRequest, XmlError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(PropfindRequest::AllProp);
    }

    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut request = None;
    let mut requested = Vec::new();

    loop {
        let element = match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => Some((local_name(e.local_name().as_ref()), false)),
            Ok(Event::Empty(e)) => Some((local_name(e.local_name().as_ref()), true)),
            Ok(Event::End(_)) => {
                stack.pop();
                None
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed(err)),
            Ok(_) => None,
        };
        buf.clear();
        let Some((name, empty)) = element else {
            continue;
        };

        if stack.is_empty() && name != "propfind" {
            return Err(XmlError::UnexpectedRoot {
                expected: "propfind",
                found: name,
            });
        }
        match (stack.len(), name.as_str()) {
            (1, "allprop") => request = Some(PropfindRequest::AllProp),
            (1, "propname") => request = Some(PropfindRequest::PropName),
            (2, _) if stack[1] == "prop" => requested.push(name.clone()),
            _ => {}
        }
        if !empty {
            stack.push(name);
        }
    }

    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    Ok(request.unwrap_or(PropfindRequest::Prop(requested)))
}

/// Parse a PROPPATCH `propertyupdate` body into set/remove instructions.
pub fn parse_proppatch(body: &[u8]) -> Result<Vec<PropPatchOp>, XmlError> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut seen_root = false;
    let mut action = None;
    let mut current: Option<(String, String)> = None;
    let mut ops = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                check_root(&stack, &name, &mut seen_root)?;
                match (stack.len(), name.as_str()) {
                    (1, "set") => action = Some(PatchAction::Set),
                    (1, "remove") => action = Some(PatchAction::Remove),
                    (3, _) if stack[2] == "prop" => current = Some((name.clone(), String::new())),
                    _ => {}
                }
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.local_name().as_ref());
                check_root(&stack, &name, &mut seen_root)?;
                if let (3, Some(action)) = (stack.len(), action) {
                    if stack[2] == "prop" {
                        ops.push(PropPatchOp {
                            action,
                            name,
                            value: String::new(),
                        });
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&e.unescape().map_err(malformed)?);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, value)) = current.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
                match stack.len() {
                    3 => {
                        if let (Some((name, value)), Some(action)) = (current.take(), action) {
                            ops.push(PropPatchOp {
                                action,
                                name,
                                value,
                            });
                        }
                    }
                    1 => action = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(malformed(err)),
            Ok(_) => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(malformed("missing propertyupdate element"));
    }
    if !stack.is_empty() {
        return Err(malformed("unexpected end of document"));
    }
    Ok(ops)
}

fn check_root(stack: &[String], name: &str, seen_root: &mut bool) -> Result<(), XmlError> {
    if !stack.is_empty() {
        return Ok(());
    }
    if name != "propertyupdate" || *seen_root {
        return Err(XmlError::UnexpectedRoot {
            expected: "propertyupdate",
            found: name.to_string(),
        });
    }
    *seen_root = true;
    Ok(())
}

/// Custom property names come from metadata keys and may not be valid
/// element names; those cannot be rendered and are skipped.
fn is_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Incrementally built `207 Multi-Status` body.
pub struct Multistatus {
    xml: String,
}

impl Default for Multistatus {
    fn default() -> Self {
        Self::new()
    }
}

impl Multistatus {
    pub fn new() -> Self {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?>"#);
        xml.push_str(r#"<multistatus xmlns="DAV:">"#);
        Self { xml }
    }

    /// Add one resource's PROPFIND result.
    pub fn push_propfind(&mut self, href: &str, props: &DavProperties, request: &PropfindRequest) {
        self.open_response(href);
        match request {
            PropfindRequest::AllProp => {
                self.open_prop();
                for (name, value) in props.iter().filter(|(name, _)| is_element_name(name)) {
                    self.push_property(name, value);
                }
                self.close_prop(STATUS_OK);
            }
            PropfindRequest::PropName => {
                self.open_prop();
                for (name, _) in props.iter().filter(|(name, _)| is_element_name(name)) {
                    self.xml.push_str(&format!("<{} />", name));
                }
                self.close_prop(STATUS_OK);
            }
            PropfindRequest::Prop(names) => {
                let names = names.iter().filter(|name| is_element_name(name));
                let (found, missing): (Vec<_>, Vec<_>) =
                    names.partition(|name| props.get(name).is_some());
                if !found.is_empty() {
                    self.open_prop();
                    for name in found {
                        self.push_property(name, props.get(name).unwrap_or_default());
                    }
                    self.close_prop(STATUS_OK);
                }
                if !missing.is_empty() {
                    self.open_prop();
                    for name in missing {
                        self.xml.push_str(&format!("<{} />", name));
                    }
                    self.close_prop(STATUS_NOT_FOUND);
                }
            }
        }
        self.xml.push_str("</response>");
    }

    /// Add a PROPPATCH result, one propstat per distinct outcome.
    pub fn push_proppatch<'a>(
        &mut self,
        href: &str,
        results: impl IntoIterator<Item = (&'a str, PatchOutcome)>,
    ) {
        let results: Vec<_> = results
            .into_iter()
            .filter(|(name, _)| is_element_name(name))
            .collect();
        self.open_response(href);
        for outcome in [
            PatchOutcome::Applied,
            PatchOutcome::Protected,
            PatchOutcome::FailedDependency,
        ] {
            let mut names = results.iter().filter(|(_, o)| *o == outcome).peekable();
            if names.peek().is_none() {
                continue;
            }
            self.open_prop();
            for (name, _) in names {
                self.xml.push_str(&format!("<{} />", name));
            }
            self.close_prop(outcome.status());
        }
        self.xml.push_str("</response>");
    }

    pub fn finish(mut self) -> String {
        self.xml.push_str("</multistatus>");
        self.xml
    }

    fn open_response(&mut self, href: &str) {
        self.xml
            .push_str(&format!("<response><href>{}</href>", escape(href)));
    }

    fn open_prop(&mut self) {
        self.xml.push_str("<propstat><prop>");
    }

    fn close_prop(&mut self, status: &str) {
        self.xml
            .push_str(&format!("</prop><status>{}</status></propstat>", status));
    }

    fn push_property(&mut self, name: &str, value: &str) {
        if name == "resourcetype" {
            // The collection marker is markup, not text.
            if value.is_empty() {
                self.xml.push_str("<resourcetype />");
            } else {
                self.xml.push_str("<resourcetype><collection /></resourcetype>");
            }
            return;
        }
        self.xml
            .push_str(&format!("<{0}>{1}</{0}>", name, escape(value)));
    }
}
