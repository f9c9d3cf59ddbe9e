//! PMML `TreeModel` documents.

use roxmltree::{Document, Node as XmlNode};

use super::{
    BooleanOperator, ModelError, ModelParser, Node, Predicate, SetOperator, SimpleOperator,
    TreeModel,
};

/// Parses the first `Node` element of a PMML document into a [`TreeModel`].
///
/// Documents nesting elements deeper than the configured limit are rejected
/// before any tree is built.
#[derive(Debug, Clone, Copy)]
pub struct PmmlParser {
    max_depth: usize,
}

impl PmmlParser {
    pub const DEFAULT_MAX_DEPTH: usize = 256;

    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }
}

impl Default for PmmlParser {
    fn default() -> Self {
        Self::with_max_depth(Self::DEFAULT_MAX_DEPTH)
    }
}

impl ModelParser for PmmlParser {
    fn parse(&self, bytes: &[u8]) -> Result<TreeModel, ModelError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| ModelError::Invalid(format!("document is not UTF-8: {e}")))?;
        check_depth(text.as_bytes(), self.max_depth)?;
        let doc = Document::parse(text).map_err(|e| ModelError::Invalid(e.to_string()))?;

        let root = doc
            .descendants()
            .find(|n| is_element(n, "Node"))
            .ok_or_else(|| ModelError::Invalid("document contains no Node element".to_string()))?;

        parse_node(root).map(TreeModel::new)
    }
}

/// Reject markup whose elements nest deeper than `max`.
///
/// One flat pass over the bytes. Malformed markup is left for the XML parser
/// to report.
fn check_depth(bytes: &[u8], max: usize) -> Result<(), ModelError> {
    let mut depth = 0usize;
    let mut pos = 0;

    while let Some(offset) = bytes[pos..].iter().position(|&b| b == b'<') {
        let start = pos + offset + 1;
        let rest = &bytes[start..];
        let consumed = match rest.first() {
            Some(b'/') => {
                depth = depth.saturating_sub(1);
                skip_past(rest, b">")
            }
            Some(b'?') => skip_past(rest, b"?>"),
            Some(b'!') if rest.starts_with(b"!--") => skip_past(rest, b"-->"),
            Some(b'!') if rest.starts_with(b"![CDATA[") => skip_past(rest, b"]]>"),
            Some(b'!') => skip_past(rest, b">"),
            Some(_) => {
                let end = start_tag_end(rest);
                let self_closing = end > 0 && rest[end - 1] == b'/';
                if !self_closing {
                    depth += 1;
                    if depth > max {
                        return Err(ModelError::Invalid(format!(
                            "document nests deeper than {max} elements"
                        )));
                    }
                }
                end + 1
            }
            None => break,
        };
        pos = (start + consumed).min(bytes.len());
    }
    Ok(())
}

/// Length of `haystack` up to and including `needle`, or all of it.
fn skip_past(haystack: &[u8], needle: &[u8]) -> usize {
    haystack
        .windows(needle.len())
        .position(|w| w == needle)
        .map_or(haystack.len(), |p| p + needle.len())
}

/// Offset of the `>` closing a start tag; quoted attribute values may hold `>`.
fn start_tag_end(tag: &[u8]) -> usize {
    let mut quote = None;
    for (i, &b) in tag.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return i,
            None => {}
        }
    }
    tag.len()
}

fn is_element(node: &XmlNode, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn parse_node(xml: XmlNode) -> Result<Node, ModelError> {
    let id = xml.attribute("id").map(str::to_string);

    let predicate = xml
        .children()
        .filter(|c| c.is_element())
        .find_map(|c| parse_predicate(c).transpose())
        .transpose()?
        .ok_or_else(|| {
            ModelError::Invalid(format!(
                "node {} has no predicate",
                id.as_deref().unwrap_or("<unnamed>")
            ))
        })?;

    let children = xml
        .children()
        .filter(|c| is_element(c, "Node"))
        .map(parse_node)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Node {
        id,
        score: xml.attribute("score").map(str::to_string),
        predicate,
        children,
    })
}

/// Parse `xml` if it is a predicate element; `Ok(None)` for anything else.
fn parse_predicate(xml: XmlNode) -> Result<Option<Predicate>, ModelError> {
    let predicate = match xml.tag_name().name() {
        "True" => Predicate::True,
        "False" => Predicate::False,
        "SimplePredicate" => {
            let field = required(&xml, "field")?;
            let operator = required(&xml, "operator")?;
            let operator = SimpleOperator::parse(operator)
                .ok_or_else(|| ModelError::Invalid(format!("unknown operator '{operator}'")))?;
            let value = xml.attribute("value").map(str::to_string);
            if operator.takes_value() && value.is_none() {
                return Err(ModelError::Invalid(format!(
                    "SimplePredicate on '{field}' is missing its value"
                )));
            }
            Predicate::Simple {
                field: field.to_string(),
                operator,
                value,
            }
        }
        "SimpleSetPredicate" => {
            let field = required(&xml, "field")?;
            let operator = required(&xml, "booleanOperator")?;
            let operator = SetOperator::parse(operator)
                .ok_or_else(|| ModelError::Invalid(format!("unknown set operator '{operator}'")))?;
            let array = xml
                .children()
                .find(|c| is_element(c, "Array"))
                .ok_or_else(|| {
                    ModelError::Invalid(format!("SimpleSetPredicate on '{field}' has no Array"))
                })?;
            Predicate::Set {
                field: field.to_string(),
                operator,
                values: split_array(array.text().unwrap_or_default()),
            }
        }
        "CompoundPredicate" => {
            let operator = required(&xml, "booleanOperator")?;
            let operator = BooleanOperator::parse(operator).ok_or_else(|| {
                ModelError::Invalid(format!("unknown boolean operator '{operator}'"))
            })?;
            let mut predicates = Vec::new();
            for child in xml.children().filter(|c| c.is_element()) {
                if let Some(p) = parse_predicate(child)? {
                    predicates.push(p);
                }
            }
            if predicates.is_empty() {
                return Err(ModelError::Invalid(
                    "CompoundPredicate has no sub-predicates".to_string(),
                ));
            }
            Predicate::Compound {
                operator,
                predicates,
            }
        }
        _ => return Ok(None),
    };
    Ok(Some(predicate))
}

fn required<'a>(xml: &'a XmlNode, name: &str) -> Result<&'a str, ModelError> {
    xml.attribute(name).ok_or_else(|| {
        ModelError::Invalid(format!(
            "{} is missing attribute '{name}'",
            xml.tag_name().name()
        ))
    })
}

/// Split PMML array content: whitespace separated, double quotes group.
fn split_array(text: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut chars = text.chars().peekable();

    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if c == '"' {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            token.push(escaped);
                        }
                    }
                    '"' => break,
                    _ => token.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                token.push(c);
                chars.next();
            }
        }
        values.push(token);
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Feature, Features};

    const MODEL: &str = r#"<?xml version="1.0"?>
<PMML version="4.3" xmlns="http://www.dmg.org/PMML-4_3">
  <DataDictionary numberOfFields="2">
    <DataField name="f1" optype="continuous" dataType="double"/>
    <DataField name="color" optype="categorical" dataType="string"/>
  </DataDictionary>
  <TreeModel functionName="regression">
    <MiningSchema>
      <MiningField name="f1"/>
    </MiningSchema>
    <Node id="0">
      <True/>
      <Node id="1" score="0.25">
        <CompoundPredicate booleanOperator="and">
          <SimplePredicate field="f1" operator="lessThan" value="2"/>
          <SimpleSetPredicate field="color" booleanOperator="isIn">
            <Array n="2" type="string">"dark red" blue</Array>
          </SimpleSetPredicate>
        </CompoundPredicate>
      </Node>
      <Node id="2" score="0.75">
        <True/>
      </Node>
    </Node>
  </TreeModel>
</PMML>"#;

    fn features(f1: f64, color: &str) -> Features {
        let mut f = Features::new();
        f.insert("f1".to_string(), Feature::Number(f1));
        f.insert("color".to_string(), Feature::Text(color.to_string()));
        f
    }

    #[test]
    fn test_parse_and_score() {
        let model = PmmlParser::default().parse(MODEL.as_bytes()).unwrap();
        assert_eq!(model.root().id.as_deref(), Some("0"));
        assert_eq!(model.root().children.len(), 2);

        assert_eq!(model.score(&features(1.0, "dark red")).unwrap(), 0.25);
        assert_eq!(model.score(&features(1.0, "green")).unwrap(), 0.75);
        assert_eq!(model.score(&features(3.0, "blue")).unwrap(), 0.75);
    }

    #[test]
    fn test_rejects_malformed_xml() {
        let err = PmmlParser::default().parse(b"<PMML><Node>").unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_rejects_document_without_nodes() {
        let err = PmmlParser::default().parse(b"<PMML/>").unwrap_err();
        assert!(matches!(err, ModelError::Invalid(_)));
    }

    #[test]
    fn test_rejects_unknown_operator() {
        let doc = r#"<Node id="0"><SimplePredicate field="a" operator="near" value="1"/></Node>"#;
        let err = PmmlParser::default().parse(doc.as_bytes()).unwrap_err();
        assert_eq!(err, ModelError::Invalid("unknown operator 'near'".to_string()));
    }

    #[test]
    fn test_rejects_node_without_predicate() {
        let err = PmmlParser::default().parse(br#"<Node id="7" score="1"/>"#).unwrap_err();
        assert_eq!(err, ModelError::Invalid("node 7 has no predicate".to_string()));
    }

    fn nested(depth: usize) -> String {
        let mut doc = r#"<Node score="1"><True/>"#.repeat(depth);
        doc.push_str(&"</Node>".repeat(depth));
        doc
    }

    #[test]
    fn test_depth_limit() {
        let parser = PmmlParser::with_max_depth(8);
        assert!(parser.parse(nested(8).as_bytes()).is_ok());

        let err = parser.parse(nested(9).as_bytes()).unwrap_err();
        assert_eq!(
            err,
            ModelError::Invalid("document nests deeper than 8 elements".to_string())
        );
    }

    #[test]
    fn test_rejects_very_deep_document() {
        let err = PmmlParser::default().parse(nested(20_000).as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Invalid(ref m) if m.contains("deeper than 256")));
    }

    #[test]
    fn test_depth_ignores_markup_in_comments_and_attributes() {
        let doc = r#"<?xml version="1.0"?>
<!-- <Node><Node><Node> -->
<Node id="a>b" score='1'><True/><![CDATA[<Node>]]></Node>"#;
        let model = PmmlParser::with_max_depth(1).parse(doc.as_bytes()).unwrap();
        assert_eq!(model.root().id.as_deref(), Some("a>b"));
    }

    #[test]
    fn test_split_array() {
        assert_eq!(
            split_array(r#" a "b c"  "d\"e" "#),
            vec!["a".to_string(), "b c".to_string(), "d\"e".to_string()]
        );
        assert!(split_array("   ").is_empty());
    }
}
