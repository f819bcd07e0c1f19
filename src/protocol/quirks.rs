//! Declarative table of peer bugs that need special reply handling.
//!
//! Some servers answer certain extension requests with replies whose length
//! field is wrong. The output path cannot fix that itself; it only tags the
//! request so the reply path knows to compensate. Rules are matched by
//! extension name, minor opcode and a predicate over the request header
//! fragment.

use std::fmt;

use super::wire_format::ByteOrder;

/// GLX minor opcode of VendorPrivateWithReply.
const GLX_VENDOR_PRIVATE_WITH_REPLY: u8 = 17;

/// GLX minor opcode of GetFBConfigs.
const GLX_GET_FB_CONFIGS: u8 = 21;

/// Vendor code of GetFBConfigsSGIX, carried in word 1 of VendorPrivateWithReply.
const GLX_GET_FB_CONFIGS_SGIX: u32 = 0x10004;

/// Tag handed to the reply tracker together with the sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Workaround {
    #[default]
    None,
    /// GLX GetFBConfigs replies report a length that is too short.
    GlxGetFbConfigsBug,
    /// Caller-defined workaround.
    Custom(&'static str),
}

/// Predicate over the first fragment of a request, as supplied by the caller.
pub type QuirkPredicate = fn(header: &[u8], order: ByteOrder) -> bool;

/// One row of the quirk table.
#[derive(Clone, Copy)]
pub struct QuirkRule {
    pub extension: &'static str,
    pub opcode: u8,
    pub matches: QuirkPredicate,
    pub workaround: Workaround,
}

impl fmt::Debug for QuirkRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuirkRule")
            .field("extension", &self.extension)
            .field("opcode", &self.opcode)
            .field("workaround", &self.workaround)
            .finish_non_exhaustive()
    }
}

fn always(_header: &[u8], _order: ByteOrder) -> bool {
    true
}

fn is_get_fb_configs_sgix(header: &[u8], order: ByteOrder) -> bool {
    order.word_at(header, 1) == Some(GLX_GET_FB_CONFIGS_SGIX)
}

/// Ordered list of quirk rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct QuirkTable {
    rules: Vec<QuirkRule>,
}

impl QuirkTable {
    /// An empty table.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Add a rule.
    pub fn push(&mut self, rule: QuirkRule) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// Add a rule that applies to every request with this opcode.
    pub fn push_opcode(
        &mut self,
        extension: &'static str,
        opcode: u8,
        workaround: Workaround,
    ) -> &mut Self {
        self.push(QuirkRule {
            extension,
            opcode,
            matches: always,
            workaround,
        })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the workaround for an extension request.
    pub fn lookup(
        &self,
        extension: &str,
        opcode: u8,
        header: &[u8],
        order: ByteOrder,
    ) -> Workaround {
        self.rules
            .iter()
            .find(|rule| {
                rule.extension == extension && rule.opcode == opcode && (rule.matches)(header, order)
            })
            .map(|rule| rule.workaround)
            .unwrap_or(Workaround::None)
    }
}

impl Default for QuirkTable {
    fn default() -> Self {
        let mut table = Self::empty();
        table
            .push(QuirkRule {
                extension: "GLX",
                opcode: GLX_VENDOR_PRIVATE_WITH_REPLY,
                matches: is_get_fb_configs_sgix,
                workaround: Workaround::GlxGetFbConfigsBug,
            })
            .push_opcode("GLX", GLX_GET_FB_CONFIGS, Workaround::GlxGetFbConfigsBug);
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// VendorPrivateWithReply: header, vendor code, context tag.
    fn vendor_private(code: u32, context_tag: u32) -> Vec<u8> {
        let mut header = vec![0u8; 12];
        header[4..8].copy_from_slice(&code.to_le_bytes());
        header[8..12].copy_from_slice(&context_tag.to_le_bytes());
        header
    }

    #[test]
    fn test_default_table_get_fb_configs() {
        let table = QuirkTable::default();
        assert_eq!(table.len(), 2);

        let w = table.lookup("GLX", 21, &[0; 8], ByteOrder::LittleEndian);
        assert_eq!(w, Workaround::GlxGetFbConfigsBug);
    }

    #[test]
    fn test_vendor_private_matches_only_sgix_code() {
        let table = QuirkTable::default();

        let sgix = vendor_private(GLX_GET_FB_CONFIGS_SGIX, 0);
        assert_eq!(
            table.lookup("GLX", 17, &sgix, ByteOrder::LittleEndian),
            Workaround::GlxGetFbConfigsBug
        );

        let other = vendor_private(0x10005, 0);
        assert_eq!(
            table.lookup("GLX", 17, &other, ByteOrder::LittleEndian),
            Workaround::None
        );

        // The context tag is not the vendor code.
        let tagged = vendor_private(0x10005, GLX_GET_FB_CONFIGS_SGIX);
        assert_eq!(
            table.lookup("GLX", 17, &tagged, ByteOrder::LittleEndian),
            Workaround::None
        );

        // Too short to carry a vendor code.
        assert_eq!(
            table.lookup("GLX", 17, &[0; 4], ByteOrder::LittleEndian),
            Workaround::None
        );
    }

    #[test]
    fn test_other_extensions_untouched() {
        let table = QuirkTable::default();
        assert_eq!(
            table.lookup("RENDER", 21, &[0; 8], ByteOrder::LittleEndian),
            Workaround::None
        );
    }

    #[test]
    fn test_custom_rule() {
        let mut table = QuirkTable::empty();
        assert!(table.is_empty());

        table.push_opcode("XKEYBOARD", 8, Workaround::Custom("xkb-get-map"));
        assert_eq!(
            table.lookup("XKEYBOARD", 8, &[], ByteOrder::BigEndian),
            Workaround::Custom("xkb-get-map")
        );
        assert_eq!(
            table.lookup("XKEYBOARD", 9, &[], ByteOrder::BigEndian),
            Workaround::None
        );
    }
}
