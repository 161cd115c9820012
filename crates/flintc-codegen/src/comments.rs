//! IR comment metadata (spec.md §4.3.7).
//!
//! Debug annotations are attached as LLVM metadata on the instructions that
//! need them rather than interleaved as literal `;` comments during
//! generation -- LLVM's printer already renders metadata as a `!123`
//! reference plus a trailing `!123 = !"text"` definition, so attaching is a
//! single `set_metadata` call per instruction. [`resolve_ir_comments`] then
//! walks the textual IR a build produced and folds each reference back into
//! a readable inline comment, the post-processing step `--emit-ir` runs
//! before writing the `.ll` file out.

use inkwell::context::Context;
use inkwell::values::{InstructionValue, MetadataValue};
use regex::Regex;

/// The metadata kind name every comment is attached under.
pub const COMMENT_METADATA_KIND: &str = "flint.comment";

/// Attaches `text` as debug metadata on `instruction`. A no-op text is still
/// attached -- callers decide whether a comment is worth the call, this
/// function doesn't filter.
pub fn attach_comment<'ctx>(context: &'ctx Context, instruction: InstructionValue<'ctx>, text: &str) {
    let kind_id = context.get_kind_id(COMMENT_METADATA_KIND);
    let md: MetadataValue<'ctx> = context.metadata_string(text);
    let _ = instruction.set_metadata(md, kind_id);
}

/// Scans `ir_string` for `flint.comment` metadata references and rewrites
/// each annotated instruction line to carry its comment inline, then strips
/// the now-redundant metadata definition lines out entirely.
pub fn resolve_ir_comments(ir_string: &str) -> String {
    let def_re = Regex::new(r#"^!(\d+) = !"(.*)"$"#).unwrap();
    let ref_re = Regex::new(r",?\s*!flint\.comment\s+!(\d+)").unwrap();

    let mut comments: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for line in ir_string.lines() {
        if let Some(caps) = def_re.captures(line.trim()) {
            let id = caps[1].to_string();
            let text = unescape_llvm_string(&caps[2]);
            comments.insert(id, text);
        }
    }

    let mut out = String::with_capacity(ir_string.len());
    for line in ir_string.lines() {
        if def_re.is_match(line.trim()) {
            // Drop the standalone metadata definition; its text now lives
            // inline on the instruction that referenced it.
            continue;
        }
        if let Some(caps) = ref_re.captures(line) {
            let id = caps[1].to_string();
            let stripped = ref_re.replace(line, "");
            if let Some(text) = comments.get(&id) {
                out.push_str(stripped.trim_end());
                out.push_str("  ; ");
                out.push_str(text);
            } else {
                out.push_str(stripped.trim_end());
            }
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Undoes LLVM's `\XX` hex-escaping of non-printable bytes in a quoted
/// metadata string.
fn unescape_llvm_string(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 2 < bytes.len() {
            if let Ok(byte) = u8::from_str_radix(&s[i + 1..i + 3], 16) {
                out.push(byte as char);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_single_comment_reference() {
        let ir = concat!(
            "define void @f() {\n",
            "  %x = add i32 1, 2, !flint.comment !0\n",
            "  ret void\n",
            "}\n",
            "!0 = !\"sum of two literals\"\n",
        );
        let resolved = resolve_ir_comments(ir);
        assert!(resolved.contains("%x = add i32 1, 2  ; sum of two literals"));
        assert!(!resolved.contains("!flint.comment"));
        assert!(!resolved.contains("!0 = !\"sum"));
    }

    #[test]
    fn leaves_unannotated_lines_untouched() {
        let ir = "define void @f() {\n  ret void\n}\n";
        assert_eq!(resolve_ir_comments(ir), ir);
    }

    #[test]
    fn unescapes_hex_byte_sequences() {
        assert_eq!(unescape_llvm_string("line1\\0Aline2"), "line1\nline2");
    }
}
