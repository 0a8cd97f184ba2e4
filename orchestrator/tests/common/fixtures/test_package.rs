//! Upload packages written to disk as real archives

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use tempfile::NamedTempFile;

/// Files of a built frontend with `index.html` at the archive root
pub const SITE_FILES: [(&str, &str); 2] = [
    ("index.html", "<!doctype html><title>site</title>"),
    ("assets/app.js", "console.log('v2');"),
];

/// Writes `files` into an archive chosen by `suffix` (`.zip`, `.tar.gz`).
/// Any other suffix gets an empty file.
pub fn write_package(suffix: &str, files: &[(&str, &str)]) -> NamedTempFile {
    let mut package = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp package");

    if suffix.ends_with(".zip") {
        let mut zip = zip::ZipWriter::new(package.reopen().expect("reopen package"));
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in files {
            zip.start_file(*name, options).expect("zip entry");
            zip.write_all(contents.as_bytes()).expect("zip write");
        }
        zip.finish().expect("zip finish");
    } else if suffix.ends_with(".tar.gz") || suffix.ends_with(".tgz") {
        let encoder = GzEncoder::new(package.as_file_mut(), Compression::default());
        let mut tar = tar::Builder::new(encoder);
        for (name, contents) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(contents.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append_data(&mut header, name, contents.as_bytes())
                .expect("tar entry");
        }
        tar.into_inner()
            .expect("tar finish")
            .finish()
            .expect("gzip finish");
    }

    package
}

/// A valid site package in the given format
pub fn site_package(suffix: &str) -> NamedTempFile {
    write_package(suffix, &SITE_FILES)
}
