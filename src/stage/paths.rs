//! Directory layout under `data_dir` and output-path derivation.

use std::path::{Path, PathBuf};

pub fn compressed_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("compressed")
}

pub fn l1c_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("l1c")
}

pub fn l2a_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("l2a")
}

pub fn cloud_mask_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("cloud_masks")
}

/// Turn a product identifier into a single safe path component.
///
/// Identifiers made only of `[A-Za-z0-9._-]` (and not only dots) are used
/// as is. Any other identifier is sanitised and suffixed with `~` plus a
/// blake3 digest of the raw identifier; `~` never survives sanitising, so
/// distinct identifiers never share a directory.
pub fn item_dir_name(item: &str) -> String {
    let sanitized: String = item
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();

    let only_dots = sanitized.chars().all(|c| c == '.');
    if sanitized == item && !only_dots {
        return sanitized;
    }

    let stem = if only_dots {
        "_".repeat(sanitized.len())
    } else {
        sanitized
    };
    let digest = blake3::hash(item.as_bytes()).to_hex();
    format!("{stem}~{}", &digest.as_str()[..16])
}

/// Move `input` from under `from_root` to the same relative place under
/// `to_root`. Inputs outside `from_root` keep only their file name.
pub fn rebase(input: &Path, from_root: &Path, to_root: &Path) -> PathBuf {
    match input.strip_prefix(from_root) {
        Ok(rel) => to_root.join(rel),
        Err(_) => match input.file_name() {
            Some(name) => to_root.join(name),
            None => to_root.to_path_buf(),
        },
    }
}

/// Output location for an L2A product derived from its L1C input:
/// rebased into `l2a_root` with the `MSIL1C` product level renamed.
pub fn l2a_output_path(input: &Path, l1c_root: &Path, l2a_root: &Path) -> PathBuf {
    let rebased = rebase(input, l1c_root, l2a_root);
    match rebased.file_name().and_then(|n| n.to_str()) {
        Some(name) if name.contains("MSIL1C") => {
            rebased.with_file_name(name.replace("MSIL1C", "MSIL2A"))
        }
        _ => rebased,
    }
}

/// Output location for a cloud mask: rebased into `mask_root`, with the
/// `.SAFE` directory turned into a `.tif` file.
pub fn cloud_mask_output_path(input: &Path, l1c_root: &Path, mask_root: &Path) -> PathBuf {
    let rebased = rebase(input, l1c_root, mask_root);
    let is_safe = rebased
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("safe"));

    if is_safe {
        rebased.with_extension("tif")
    } else {
        let mut os = rebased.into_os_string();
        os.push(".tif");
        PathBuf::from(os)
    }
}
