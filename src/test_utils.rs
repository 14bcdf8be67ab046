use std::path::{Path, PathBuf};

use crate::cube::{Cube, TsType};

pub(crate) fn test_data_dir() -> PathBuf {
    let crate_root = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(crate_root).join("test-data")
}

/// A monthly 1D cube holding `values`.
pub(crate) fn cube_1d(var_name: &str, units: &str, values: &[f64]) -> Cube {
    let data = ndarray::Array1::from(values.to_vec()).into_dyn();
    Cube::new(var_name, units, TsType::Monthly, data)
}

/// Collect the contents of every fenced block tagged with `tag` in a Markdown file.
///
/// Fenced blocks start and end with three backticks; the opening fence must be
/// immediately followed by `tag` (e.g. "```toml"). The returned strings do not
/// include the fences. An unclosed block at the end of the file is an error.
pub(crate) fn fenced_blocks(tag: &str, file: &Path) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(file)?;
    let fence_start = format!("```{tag}");
    let mut blocks = vec![];
    let mut block_start: Option<usize> = None;
    let mut block_lines: Vec<&str> = vec![];

    for (iline, line) in text.lines().enumerate() {
        if block_start.is_some() {
            if line.starts_with("```") {
                blocks.push(block_lines.join("\n"));
                block_lines.clear();
                block_start = None;
            } else {
                block_lines.push(line);
            }
        } else if line.starts_with(&fence_start) {
            block_start = Some(iline + 1);
        }
    }

    if let Some(start) = block_start {
        let msg = format!("fenced block starting at line {start} of {} was still unclosed at the end of the file", file.display());
        return Err(std::io::Error::other(msg));
    }
    Ok(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fenced_blocks() {
        let md_file = test_data_dir().join("inputs").join("fenced.md");
        let blocks = fenced_blocks("toml", &md_file).unwrap();
        let expected = ["key1 = 1\nkey2 = 2", "key3 = 3"];
        assert_eq!(blocks, expected);
    }
}
