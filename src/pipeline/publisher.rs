//! Rewrites a verified package's repository metadata and pushes it to the
//! destination GitHub Packages NuGet feed.

use std::{
    fs,
    io::{Read as _, Write as _},
    path::{Path, PathBuf},
};

use regex_lite::{Captures, Regex};
use tokio::process::Command;
use tracing::{debug, info};
use zip::{ZipArchive, ZipWriter, write::SimpleFileOptions};

use crate::{
    config::{Config, Repository},
    error::{RelayError, RelayResult},
    static_lazy_lock,
};

static_lazy_lock! {
    REPOSITORY_URL: Regex = Regex::new(r#"(<repository\b[^>]*?url=")[^"]*(")"#).unwrap();
}

const SOURCE_NAME: &str = "github";

/// Rejects anything that is not a NuGet package.
///
/// # Errors
///
/// Returns [`RelayError::UnsupportedPackageKind`] for other name suffixes.
pub fn ensure_nupkg(name: &str) -> RelayResult<()> {
    if name.ends_with(".nupkg") {
        Ok(())
    } else {
        Err(RelayError::UnsupportedPackageKind {
            package: name.to_owned(),
        })
    }
}

/// Rewrites the manifest's `repository url` attribute, line by line, leaving
/// everything else untouched. Only the first occurrence is patched; a
/// manifest has a single `repository` element.
pub fn patch_nuspec(text: &str, url: &str) -> String {
    let mut patched = false;
    text.split_inclusive('\n')
        .map(|line| {
            if !patched && REPOSITORY_URL.is_match(line) {
                patched = true;
                REPOSITORY_URL
                    .replace(line, |caps: &Captures<'_>| {
                        format!("{}{url}{}", &caps[1], &caps[2])
                    })
                    .into_owned()
            } else {
                line.to_owned()
            }
        })
        .collect()
}

/// Repacks the package with its `.nuspec` pointing at the destination
/// repository, a registry requirement for GitHub Packages.
///
/// Returns the path of the rewritten package inside `workdir`.
///
/// # Errors
///
/// Returns an error if the package archive cannot be read or rewritten.
pub fn rewrite_repository_url(
    package_path: &Path,
    destination: &Repository,
    workdir: &Path,
) -> RelayResult<PathBuf> {
    let url = format!(
        "https://github.com/{}/{}",
        destination.owner, destination.repo
    );
    let package_name = package_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("package.nupkg")
        .to_owned();

    let mut archive = ZipArchive::new(fs::File::open(package_path)?)?;
    let out_path = workdir.join(&package_name);
    let mut writer = ZipWriter::new(fs::File::create(&out_path)?);

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let entry_name = entry.name().to_owned();

        if entry.is_dir() {
            writer.add_directory(entry_name, SimpleFileOptions::default())?;
            continue;
        }

        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;

        if entry_name.ends_with(".nuspec") {
            let text = String::from_utf8_lossy(&bytes);
            debug!("patching repository url in {entry_name}");
            bytes = patch_nuspec(&text, &url).into_bytes();
        }

        writer.start_file(entry_name, SimpleFileOptions::default())?;
        writer.write_all(&bytes)?;
    }

    writer.finish()?;
    info!("rewrote {package_name} to reference {url}");
    Ok(out_path)
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Builds the registry configuration document registering a single source
/// with its credentials. The secret only ever lands in the attribute value,
/// never in a path or a log line.
pub fn nuget_config_document(owner: &str, username: &str, password: &str) -> String {
    let feed = format!("https://nuget.pkg.github.com/{}/index.json", xml_escape(owner));
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<configuration>
  <packageSources>
    <add key="{SOURCE_NAME}" value="{feed}" />
  </packageSources>
  <packageSourceCredentials>
    <{SOURCE_NAME}>
      <add key="Username" value="{}" />
      <add key="ClearTextPassword" value="{}" />
    </{SOURCE_NAME}>
  </packageSourceCredentials>
</configuration>
"#,
        xml_escape(username),
        xml_escape(password),
    )
}

/// Writes a fresh `nuget.config` for this run into `workdir`.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_nuget_config(workdir: &Path, destination: &Repository, token: &str) -> RelayResult<PathBuf> {
    let path = workdir.join("nuget.config");
    fs::write(
        &path,
        nuget_config_document(&destination.owner, &destination.owner, token),
    )?;
    Ok(path)
}

fn push_args(package: &Path, config_file: &Path, token: &str) -> Vec<std::ffi::OsString> {
    vec![
        "nuget".into(),
        "push".into(),
        package.into(),
        "--source".into(),
        SOURCE_NAME.into(),
        "--configfile".into(),
        config_file.into(),
        "--api-key".into(),
        token.into(),
    ]
}

/// Rewrites and pushes a verified package file.
///
/// # Errors
///
/// Returns [`RelayError::UnsupportedPackageKind`] for non-NuGet packages and
/// [`RelayError::RegistryPushFailed`] when the push command exits
/// unsuccessfully. Push failures are surfaced as-is; there is no retry.
pub async fn publish(config: &Config, package_path: &Path, workdir: &Path) -> RelayResult<()> {
    let package_name = package_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default()
        .to_owned();
    ensure_nupkg(&package_name)?;

    let rewritten = rewrite_repository_url(package_path, &config.destination, workdir)?;
    let config_file = write_nuget_config(workdir, &config.destination, &config.registry_token)?;

    info!("pushing {package_name} to the {SOURCE_NAME} source…");
    // The per-run config file is named explicitly so an ambient user- or
    // machine-level source with the same key cannot win.
    let output = Command::new("dotnet")
        .args(push_args(&rewritten, &config_file, &config.registry_token))
        .current_dir(workdir)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let detail = match (stderr.trim(), stdout.trim()) {
            ("", out) => out.to_owned(),
            (err, "") => err.to_owned(),
            (err, out) => format!("{err}; {out}"),
        };
        return Err(RelayError::RegistryPushFailed {
            package: package_name,
            detail: format!("{} ({})", detail, output.status),
        });
    }

    info!("pushed {package_name}");
    Ok(())
}
