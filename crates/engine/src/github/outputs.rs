// Step outputs via the `$GITHUB_OUTPUT` file.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::Context;

const MULTILINE_DELIMITER: &str = "VERSIONER_OUTPUT_EOF";

/// Render one `name=value` entry; multi-line values use the heredoc form.
pub fn render_output(name: &str, value: &str) -> String {
    if value.contains('\n') || value.contains('\r') {
        format!("{name}<<{MULTILINE_DELIMITER}\n{value}\n{MULTILINE_DELIMITER}\n")
    } else {
        format!("{name}={value}\n")
    }
}

/// Append outputs to the file named by `$GITHUB_OUTPUT`.
pub fn append_outputs(path: &Path, outputs: &[(&str, String)]) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open step output file `{}`", path.display()))?;
    for (name, value) in outputs {
        file.write_all(render_output(name, value).as_bytes())
            .with_context(|| format!("failed to write output `{name}`"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn single_line_value() {
        assert_eq!(render_output("version", "7"), "version=7\n");
    }

    #[test]
    fn multi_line_value_uses_delimiter() {
        assert_eq!(
            render_output("notes", "a\nb"),
            "notes<<VERSIONER_OUTPUT_EOF\na\nb\nVERSIONER_OUTPUT_EOF\n"
        );
    }

    #[test]
    fn appends_without_clobbering_earlier_steps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("output");
        std::fs::write(&path, "lfs-status=configured\n").unwrap();

        append_outputs(
            &path,
            &[("version", "3".to_string()), ("versioning-branch", "versioning-main".to_string())],
        )
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "lfs-status=configured\nversion=3\nversioning-branch=versioning-main\n"
        );
    }
}
