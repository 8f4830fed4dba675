//! Test fixtures and sample data
//!
//! Provides config templates and helpers for reading mock transcripts.

use std::path::Path;

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
[global]
password_file = "{password_file}"
mounts = "{mounts}"

[[hosts]]
name = "h1"

[[hosts.volumes]]
name = "v1"
type = "lvm"
filesystem = "ext4"
location = "/dev/vg0/v1"
"#
}

/// Two hosts, the second with a filesystem nothing can mount
pub fn unsupported_filesystem_config_toml() -> &'static str {
    r#"
[global]
password_file = "{password_file}"
mounts = "{mounts}"

[[hosts]]
name = "h1"

[[hosts.volumes]]
name = "v1"
type = "lvm"
filesystem = "ext4"
location = "/dev/vg0/v1"

[[hosts]]
name = "h2"

[[hosts.volumes]]
name = "data"
type = "lvm"
filesystem = "btrfs"
location = "/dev/vg1/data"
"#
}

/// Fill the `{password_file}` and `{mounts}` placeholders of a template
pub fn render_config(template: &str, password_file: &Path, mounts: &Path) -> String {
    template
        .replace("{password_file}", &password_file.display().to_string())
        .replace("{mounts}", &mounts.display().to_string())
}

/// Index of the first transcript line containing `needle`, panicking when absent
pub fn position_of(calls: &[String], needle: &str) -> usize {
    calls
        .iter()
        .position(|c| c.contains(needle))
        .unwrap_or_else(|| panic!("No command containing '{}' in {:#?}", needle, calls))
}

/// Replace the timestamp in generated snapshot names (`name:rb<digits>`)
/// so transcripts from separate runs can be compared
pub fn normalize_timestamps(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;

    while let Some(idx) = rest.find(":rb") {
        out.push_str(&rest[..idx + 3]);
        rest = rest[idx + 3..].trim_start_matches(|c: char| c.is_ascii_digit());
        out.push('T');
    }
    out.push_str(rest);
    out
}
