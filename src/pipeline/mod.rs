//! # Pipeline Module
//!
//! Per-scan feature extraction. One [`ScanJob`] walks the stages
//! `Loaded -> RoiExtracted -> NonTexturePreprocessed -> NonTextureComputed
//! -> TextureLoop -> Saved`; any stage may end the job with a [`ScanError`].
//! Feature groups fail individually without ending the job.

pub mod stages;
pub mod task;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::config::{ComputationConfig, ImagingParams};
use crate::features::{FeatureBackend, FeatureGroup, StandardBackend};
use crate::logging::SlotLog;
use crate::processing::discretize::{BinSpec, discretize};
use crate::processing::filter::FilterError;
use crate::processing::roi::{RoiError, extract_roi};
use crate::processing::{Mask, Volume};
use crate::record::{FeatureRecord, GroupOutcome, SpaceFeatures};
use crate::scan::{ScanId, ScanLoadError, ScanSource};
use crate::store::{ResultStore, StoreError};

use stages::{Prepared, evaluate, filter_prepared, non_texture_quantization, prepare, texture_key};

pub use task::ScanTask;

/// One scan and ROI to process under a given configuration.
#[derive(Debug, Clone)]
pub struct ScanJob {
    pub scan_id: ScanId,
    pub roi_name: String,
    pub roi_type: String,
    pub roi_type_label: String,
    pub config: Arc<ComputationConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loaded,
    RoiExtracted,
    NonTexturePreprocessed,
    NonTextureComputed,
    TextureLoop,
    Saved,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Loaded => "loaded",
            Stage::RoiExtracted => "roi_extracted",
            Stage::NonTexturePreprocessed => "non_texture_preprocessed",
            Stage::NonTextureComputed => "non_texture_computed",
            Stage::TextureLoop => "texture_loop",
            Stage::Saved => "saved",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Load(#[from] ScanLoadError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Roi(#[from] RoiError),
    #[error("roi `{0}` has no usable intensities after re-segmentation")]
    EmptyRoi(String),
    #[error("filter error: {0}")]
    Filter(FilterError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<FilterError> for ScanError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::Textural => ScanError::Config(err.to_string()),
            other => ScanError::Filter(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Saved(PathBuf),
    /// A record already existed and `skip_existing` was set.
    Skipped(PathBuf),
}

pub struct ScanPipeline {
    config_hash: String,
    source: Arc<dyn ScanSource>,
    store: ResultStore,
    backend: Arc<dyn FeatureBackend>,
}

impl ScanPipeline {
    pub fn new(config_hash: &str, source: Arc<dyn ScanSource>, store: ResultStore) -> Self {
        Self {
            config_hash: config_hash.to_string(),
            source,
            store,
            backend: Arc::new(StandardBackend),
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn FeatureBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn process(&self, job: &ScanJob, log: &SlotLog) -> Result<ScanOutcome, ScanError> {
        let started = Instant::now();
        let config = job.config.as_ref();
        let path = self
            .store
            .record_path(&job.roi_type, &job.scan_id, &job.roi_type_label);
        if config.skip_existing && path.is_file() {
            log.info(&format!("{}: record exists, skipping", job.scan_id));
            return Ok(ScanOutcome::Skipped(path));
        }

        let scan = self.source.load(&job.scan_id)?;
        enter(log, job, Stage::Loaded);

        let params = config.imaging(&job.scan_id.modality).ok_or_else(|| {
            ScanError::Config(format!(
                "no imaging parameters for modality `{}`",
                job.scan_id.modality
            ))
        })?;
        let (volume, roi) = extract_roi(&scan, &job.roi_name, params.box_margin)?;
        drop(scan);
        enter(log, job, Stage::RoiExtracted);

        let prepared = prepare(&volume, &roi, params, params.scale_non_text);
        enter(log, job, Stage::NonTexturePreprocessed);
        if !prepared.has_intensities() {
            return Err(ScanError::EmptyRoi(job.roi_name.clone()));
        }
        let prepared = filter_prepared(prepared, config, params)?;

        let space = config.feature_space(params);
        let mut record = FeatureRecord::new(
            job.scan_id.clone(),
            &job.roi_name,
            &job.roi_type,
            &job.roi_type_label,
            &self.config_hash,
        );
        self.non_texture_groups(config, params, &prepared, record.space_mut(&space), log);
        drop(prepared);
        enter(log, job, Stage::NonTextureComputed);

        enter(log, job, Stage::TextureLoop);
        for scale in &params.scale_text {
            self.texture_scale(config, params, &volume, &roi, *scale, record.space_mut(&space), log)?;
            log.info(&format!(
                "{}: texture scale {:?} done after {:.2}s",
                job.scan_id,
                scale,
                started.elapsed().as_secs_f64()
            ));
        }

        let saved = self.store.save(&record)?;
        enter(log, job, Stage::Saved);
        log.info(&format!(
            "{}: saved {} in {:.2}s",
            job.scan_id,
            saved.display(),
            started.elapsed().as_secs_f64()
        ));
        Ok(ScanOutcome::Saved(saved))
    }

    fn non_texture_groups(
        &self,
        config: &ComputationConfig,
        params: &ImagingParams,
        prepared: &Prepared,
        out: &mut SpaceFeatures,
        log: &SlotLog,
    ) {
        for group in FeatureGroup::NON_TEXTURE {
            let outcome = if !config.is_enabled(group) {
                GroupOutcome::Disabled
            } else {
                match non_texture_quantization(group, &prepared.intensities, params) {
                    None => evaluate(self.backend.as_ref(), group, &prepared.input(None), log),
                    Some(Ok(q)) => evaluate(self.backend.as_ref(), group, &prepared.input(Some(&q)), log),
                    Some(Err(err)) => {
                        log.warn(&format!("{group}: discretization failed: {err}"));
                        GroupOutcome::failed(err.to_string())
                    }
                }
            };
            out.insert(group.key().to_string(), outcome);
        }
    }

    /// One pass of the texture loop: re-prepare at `scale`, then every
    /// `(algorithm, grey level)` pair.
    #[allow(clippy::too_many_arguments)]
    fn texture_scale(
        &self,
        config: &ComputationConfig,
        params: &ImagingParams,
        volume: &Volume,
        roi: &Mask,
        scale: [f64; 3],
        out: &mut SpaceFeatures,
        log: &SlotLog,
    ) -> Result<(), ScanError> {
        let enabled: Vec<FeatureGroup> = FeatureGroup::TEXTURE
            .into_iter()
            .filter(|g| config.is_enabled(*g))
            .collect();
        let disc = &params.discretisation;
        let prepared = if enabled.is_empty() {
            None
        } else {
            Some(filter_prepared(prepare(volume, roi, params, scale), config, params)?)
        };

        for (algo, levels) in disc.algos.iter().zip(&disc.gray_levels) {
            for level in levels {
                let spec = BinSpec {
                    algo: *algo,
                    val: *level,
                };
                let quantized = prepared
                    .as_ref()
                    .map(|p| discretize(&p.intensities, spec, disc.user_set_min_value));
                for group in FeatureGroup::TEXTURE {
                    let key = texture_key(group, scale, *algo, *level);
                    let outcome = match (&prepared, &quantized) {
                        _ if !enabled.contains(&group) => GroupOutcome::Disabled,
                        (Some(p), Some(Ok(q))) => evaluate(self.backend.as_ref(), group, &p.input(Some(q)), log),
                        (_, Some(Err(err))) => GroupOutcome::failed(err.to_string()),
                        _ => GroupOutcome::failed("texture input unavailable"),
                    };
                    out.insert(key, outcome);
                }
                if let Some(Err(err)) = &quantized {
                    log.warn(&format!("{algo} {level}: discretization failed: {err}"));
                }
            }
        }
        Ok(())
    }
}

fn enter(log: &SlotLog, job: &ScanJob, stage: Stage) {
    log.info(&format!("{}({}): {stage}", job.scan_id, job.roi_type_label));
}
