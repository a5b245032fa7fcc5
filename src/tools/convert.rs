use crate::error::{Error, Result};
use crate::utils::files::{ensure_directory, list_files, run_stamp, split_name};
use crate::utils::images::{convert_image, is_supported_extension, target_format};
use image::ImageFormat;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_SOURCE_DIR: &str = "./to_be_converted/";
pub const DEFAULT_TARGET_EXT: &str = ".png";
pub const DEFAULT_TARGET_DIR: &str = "./converted/";

/// What happened to one directory entry
#[derive(Debug)]
pub enum ConversionOutcome {
    Converted { source: PathBuf, target: PathBuf },
    Skipped { source: PathBuf, reason: String },
    Failed { source: PathBuf, error: Error },
}

#[derive(Debug)]
pub struct ImageConverter {
    source_dir: PathBuf,
    output_dir: PathBuf,
    target_ext: String,
    format: ImageFormat,
}

impl ImageConverter {
    /// Converter writing into `<target_root>/<current time stamp>/`
    pub fn new(source_dir: &Path, target_ext: &str, target_root: &Path) -> Result<Self> {
        Self::with_stamp(
            source_dir,
            target_ext,
            target_root,
            &run_stamp(chrono::Local::now()),
        )
    }

    pub fn with_stamp(
        source_dir: &Path,
        target_ext: &str,
        target_root: &Path,
        stamp: &str,
    ) -> Result<Self> {
        let (target_ext, format) = target_format(target_ext)?;
        if !source_dir.is_dir() {
            return Err(Error::NotFound(format!(
                "source directory {}",
                source_dir.display()
            )));
        }

        let output_dir = target_root.join(stamp);
        ensure_directory(&output_dir)?;

        Ok(Self {
            source_dir: source_dir.to_path_buf(),
            output_dir,
            target_ext,
            format,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Decide, for every file in the source directory, whether and where it is written
    fn plan(&self) -> Result<(Vec<(PathBuf, PathBuf)>, Vec<ConversionOutcome>)> {
        let mut jobs = Vec::new();
        let mut skipped = Vec::new();
        let mut targets = HashSet::new();

        for source in list_files(&self.source_dir)? {
            let Some((stem, ext)) = split_name(&source) else {
                skipped.push(ConversionOutcome::Skipped {
                    source,
                    reason: "no file extension".into(),
                });
                continue;
            };

            if !is_supported_extension(&ext) {
                skipped.push(ConversionOutcome::Skipped {
                    source,
                    reason: format!("unsupported extension '.{}'", ext),
                });
                continue;
            }

            let target = self
                .output_dir
                .join(format!("{}.{}", stem, self.target_ext));
            if !targets.insert(target.clone()) {
                skipped.push(ConversionOutcome::Skipped {
                    source,
                    reason: format!("{} is already produced by another file", target.display()),
                });
                continue;
            }

            jobs.push((source, target));
        }

        Ok((jobs, skipped))
    }

    /// Convert every whitelisted file; individual failures are reported, not fatal
    pub fn convert_all(&self) -> Result<Vec<ConversionOutcome>> {
        let (jobs, mut outcomes) = self.plan()?;

        info!(
            action = "start",
            component = "convert",
            source = ?self.source_dir,
            output = ?self.output_dir,
            to_convert = jobs.len(),
            skipped = outcomes.len(),
            "Starting conversion"
        );

        let pb = ProgressBar::new(jobs.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            pb.set_style(style.progress_chars("#>-"));
        }

        let converted: Vec<ConversionOutcome> = jobs
            .into_par_iter()
            .map(|(source, target)| {
                let outcome = match convert_image(&source, &target, self.format) {
                    Ok(()) => ConversionOutcome::Converted { source, target },
                    Err(error) => {
                        warn!(
                            action = "convert",
                            component = "convert",
                            source = ?source,
                            error = %error,
                            "Conversion failed"
                        );
                        ConversionOutcome::Failed { source, error }
                    }
                };
                pb.inc(1);
                outcome
            })
            .collect();

        pb.finish_and_clear();
        outcomes.extend(converted);
        Ok(outcomes)
    }
}
