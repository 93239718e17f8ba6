//! Descriptor parser.
//!
//! A descriptor is the `x-oss-process` pipeline string:
//!
//! ```text
//! descriptor := segment ("/" segment)*
//! segment    := opname ("," token)*
//! token      := key "_" value
//! ```
//!
//! e.g. `resize,w_200,m_pad/blur,s_5,r_10/format,webp`.
//!
//! Parsing only tokenizes. Two names get special placement: `info` sets a flag
//! (the caller then ignores everything else) and `format` is pulled out of the
//! sequence because it always runs last. Every other operation keeps its
//! original position. Option values are interpreted later, per operation.

use crate::error::ProcessError;

/// Namespace prefix some clients put in front of the descriptor.
pub const NAMESPACE: &str = "image/";

/// One named step with its raw option tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub name: String,
    pub options: Vec<String>,
}

impl Operation {
    /// Option tokens split into `(key, value)` at the first `_`.
    ///
    /// Tokens without a separator are skipped.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.options.iter().filter_map(|token| token.split_once('_'))
    }

    /// Serialize back to `name,token,token`.
    pub fn to_segment(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.options.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parsed descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Descriptor {
    /// Operations in execution order, without `info` and `format`.
    pub operations: Vec<Operation>,
    /// The `format` operation, if any. The last one wins.
    pub format: Option<Operation>,
    /// An `info` operation appeared somewhere.
    pub info: bool,
}

impl Descriptor {
    /// Serialize the ordered operations back to descriptor form.
    ///
    /// `info` and `format` are not part of the ordered list and are not emitted.
    pub fn to_descriptor_string(&self) -> String {
        self.operations
            .iter()
            .map(Operation::to_segment)
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Remove a leading `image/` namespace, if present.
pub fn strip_namespace(raw: &str) -> &str {
    raw.strip_prefix(NAMESPACE).unwrap_or(raw)
}

/// Tokenize a descriptor into operations.
///
/// Fails with `Param` when the descriptor is empty, a segment is empty, or a
/// segment has no operation name.
pub fn parse(descriptor: &str) -> Result<Descriptor, ProcessError> {
    if descriptor.is_empty() {
        return Err(ProcessError::param("Missing required param: x-oss-process"));
    }

    let mut parsed = Descriptor::default();
    for (index, segment) in descriptor.split('/').enumerate() {
        if segment.is_empty() {
            return Err(ProcessError::param(format!(
                "empty operation at position {index}"
            )));
        }
        let mut tokens = segment.split(',');
        let name = tokens.next().unwrap_or_default();
        if name.is_empty() {
            return Err(ProcessError::param(format!(
                "missing operation name in `{segment}`"
            )));
        }
        let op = Operation {
            name: name.to_string(),
            options: tokens.filter(|t| !t.is_empty()).map(str::to_string).collect(),
        };
        match op.name.as_str() {
            "info" => parsed.info = true,
            "format" => parsed.format = Some(op),
            _ => parsed.operations.push(op),
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_segments_and_tokens() {
        let d = parse("resize,w_200,h_100/blur,s_5,r_10").unwrap();
        assert_eq!(d.operations.len(), 2);
        assert_eq!(d.operations[0].name, "resize");
        assert_eq!(d.operations[0].options, vec!["w_200", "h_100"]);
        assert_eq!(d.operations[1].name, "blur");
        assert!(!d.info);
        assert!(d.format.is_none());
    }

    #[test]
    fn format_is_extracted_from_sequence() {
        let d = parse("format,png/resize,w_10").unwrap();
        assert_eq!(d.operations.len(), 1);
        assert_eq!(d.operations[0].name, "resize");
        assert_eq!(d.format.as_ref().unwrap().options, vec!["png"]);
    }

    #[test]
    fn last_format_wins() {
        let d = parse("format,png/format,webp").unwrap();
        assert_eq!(d.format.unwrap().options, vec!["webp"]);
    }

    #[test]
    fn info_anywhere_sets_flag() {
        let d = parse("resize,w_10/info/blur,s_1,r_1").unwrap();
        assert!(d.info);
        assert_eq!(d.operations.len(), 2);
    }

    #[test]
    fn unknown_names_are_kept_for_the_dispatcher() {
        let d = parse("sharpen,100").unwrap();
        assert_eq!(d.operations[0].name, "sharpen");
    }

    #[test]
    fn empty_descriptor_is_param_error() {
        assert!(matches!(parse(""), Err(ProcessError::Param(_))));
    }

    #[test]
    fn empty_segment_is_param_error() {
        assert!(matches!(parse("resize,w_1//blur"), Err(ProcessError::Param(_))));
        assert!(matches!(parse("resize,w_1/"), Err(ProcessError::Param(_))));
    }

    #[test]
    fn missing_name_is_param_error() {
        assert!(matches!(parse(",w_100"), Err(ProcessError::Param(_))));
    }

    #[test]
    fn params_split_at_first_underscore() {
        let d = parse("watermark,text_a_b,fill_1,bare").unwrap();
        let params: Vec<_> = d.operations[0].params().collect();
        assert_eq!(params, vec![("text", "a_b"), ("fill", "1")]);
    }

    #[test]
    fn reserializing_preserves_order_of_ordinary_operations() {
        let raw = "resize,w_200,m_pad/info/watermark,text_SGk/format,png/blur,s_2,r_4";
        let d = parse(raw).unwrap();
        assert_eq!(
            d.to_descriptor_string(),
            "resize,w_200,m_pad/watermark,text_SGk/blur,s_2,r_4"
        );
        assert_eq!(parse(&d.to_descriptor_string()).unwrap().operations, d.operations);
    }

    #[test]
    fn strip_namespace_only_removes_leading_prefix() {
        assert_eq!(strip_namespace("image/resize,w_1"), "resize,w_1");
        assert_eq!(strip_namespace("resize,w_1"), "resize,w_1");
        assert_eq!(
            strip_namespace("watermark,text_image/x"),
            "watermark,text_image/x"
        );
    }
}
