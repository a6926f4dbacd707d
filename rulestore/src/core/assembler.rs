//! Deterministic assembly of package source text.

use crate::core::format::{AssetFormat, Emit};

/// One asset's contribution to an assembled source.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyInput<'a> {
    pub name: &'a str,
    pub format: AssetFormat,
    pub content: &'a [u8],
}

/// Assemble a package's source text.
///
/// Layout: a `package <name>` line, the header, then every inlined asset in
/// ascending name order, each block separated by one blank line. Formats the
/// lookup table marks [`Emit::Omit`] contribute nothing. The output depends
/// only on the arguments, never on their order.
pub fn assemble(package_name: &str, header: &str, assets: &[AssemblyInput<'_>]) -> String {
    let mut ordered: Vec<&AssemblyInput<'_>> = assets.iter().collect();
    ordered.sort_by(|a, b| a.name.cmp(b.name).then_with(|| a.format.cmp(&b.format)));

    let mut blocks: Vec<String> = Vec::with_capacity(ordered.len() + 2);
    blocks.push(format!("package {package_name}"));

    let header = header.trim_end();
    if !header.trim_start().is_empty() {
        blocks.push(header.to_string());
    }

    for asset in ordered {
        if asset.format.emit() == Emit::Omit {
            continue;
        }
        let text = String::from_utf8_lossy(asset.content);
        let text = text.trim_end();
        if text.trim_start().is_empty() {
            continue;
        }
        blocks.push(text.to_string());
    }

    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}
