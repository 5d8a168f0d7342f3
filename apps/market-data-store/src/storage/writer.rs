//! High-level writer for one instrument, resolution and data kind.
//!
//! Ties the resolver, codec and archive together: observations are split by
//! partition date, each partition is encoded and merged into its container
//! under the container's lock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::NaiveDate;
use rayon::prelude::*;
use tracing::{debug, info};

use super::archive::{Archive, WriteOutcome};
use super::codec::LineCodec;
use super::locks::ContainerLocks;
use super::paths::{ResolvedPath, resolve};
use crate::config::StorageConfig;
use crate::domain::{DataKind, Instrument, Observation, Resolution, validate_date};
use crate::error::StoreError;

/// Writes observation batches for a single instrument/resolution/kind.
#[derive(Debug, Clone)]
pub struct DataWriter {
    data_directory: PathBuf,
    instrument: Instrument,
    resolution: Resolution,
    kind: DataKind,
    codec: LineCodec,
    archive: Archive,
    locks: Arc<ContainerLocks>,
}

impl DataWriter {
    /// Create a writer with default codec and compression settings.
    pub fn new(
        data_directory: impl Into<PathBuf>,
        instrument: Instrument,
        resolution: Resolution,
        kind: DataKind,
    ) -> Self {
        Self {
            data_directory: data_directory.into(),
            instrument,
            resolution,
            kind,
            codec: LineCodec::default(),
            archive: Archive::default(),
            locks: ContainerLocks::global(),
        }
    }

    /// Create a writer using the directory, precision and compression from `config`.
    pub fn from_config(
        config: &StorageConfig,
        instrument: Instrument,
        resolution: Resolution,
        kind: DataKind,
    ) -> Self {
        Self::new(&config.data_directory, instrument, resolution, kind)
            .with_codec(LineCodec::new(config.price_decimals))
            .with_archive(Archive::new(config.compression, config.compression_level))
    }

    /// Use a specific codec.
    #[must_use]
    pub const fn with_codec(mut self, codec: LineCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Use specific archive settings.
    #[must_use]
    pub const fn with_archive(mut self, archive: Archive) -> Self {
        self.archive = archive;
        self
    }

    /// Use a private lock registry instead of the process-wide one.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<ContainerLocks>) -> Self {
        self.locks = locks;
        self
    }

    /// Root data directory.
    pub fn data_directory(&self) -> &Path {
        &self.data_directory
    }

    /// Instrument being written.
    pub const fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    /// Resolution being written.
    pub const fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Data kind being written.
    pub const fn kind(&self) -> DataKind {
        self.kind
    }

    /// Container and entry for `date`.
    pub fn resolve(&self, date: NaiveDate) -> Result<ResolvedPath, StoreError> {
        resolve(
            &self.data_directory,
            &self.instrument,
            date,
            self.resolution,
            self.kind,
        )
    }

    /// Write `observations`, replacing this instrument's entry in every
    /// container they touch.
    ///
    /// Observations must share this writer's shape and be in time order; they
    /// are not re-sorted. Sub-daily data is split by calendar date and each
    /// date's container is written independently. Returns the containers
    /// written, ordered by date.
    ///
    /// # Errors
    ///
    /// - `InvalidDescriptor` for dates outside the supported range or an
    ///   observation shape that does not match the resolution/kind
    /// - `StorageIoFailure` / `CorruptContainer` from the archive layer
    ///
    /// Containers for other dates may already have been written when an error
    /// is returned; each of them is complete.
    pub fn write(&self, observations: &[Observation]) -> Result<Vec<PathBuf>, StoreError> {
        if observations.is_empty() {
            debug!(instrument = %self.instrument, "No observations to write");
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let partitions = self.partition(observations)?;

        let written = partitions
            .par_iter()
            .map(|(date, batch)| self.write_partition(*date, batch))
            .collect::<Result<Vec<_>, _>>()?;

        let containers: Vec<PathBuf> = written.into_iter().flatten().collect();

        info!(
            instrument = %self.instrument,
            resolution = %self.resolution,
            kind = %self.kind,
            observations = observations.len(),
            containers = containers.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Observations written"
        );

        Ok(containers)
    }

    /// Read back this instrument's observations for `date`.
    ///
    /// An existing container without this instrument's entry yields an empty
    /// vector.
    ///
    /// # Errors
    ///
    /// - `ContainerNotFound` if no container exists for `date`
    /// - `CorruptContainer` if the container or entry cannot be decoded
    pub fn read(&self, date: NaiveDate) -> Result<Vec<Observation>, StoreError> {
        let resolved = self.resolve(date)?;
        let entries = self.archive.read_all(&resolved.container)?;

        let Some(lines) = entries.get(&resolved.entry) else {
            debug!(
                container = %resolved.container.display(),
                entry = %resolved.entry,
                "Entry not present in container"
            );
            return Ok(Vec::new());
        };

        self.codec
            .decode(lines.as_slice(), date, self.resolution, self.kind)
            .map_err(|e| {
                StoreError::corrupt(&resolved.container, format!("entry '{}': {e}", resolved.entry))
            })
    }

    /// Group observations by the date whose container they belong to.
    fn partition(
        &self,
        observations: &[Observation],
    ) -> Result<BTreeMap<NaiveDate, Vec<Observation>>, StoreError> {
        let mut partitions: BTreeMap<NaiveDate, Vec<Observation>> = BTreeMap::new();

        if self.resolution.is_sub_daily() {
            for observation in observations {
                partitions
                    .entry(observation.date())
                    .or_default()
                    .push(observation.clone());
            }
            return Ok(partitions);
        }

        // One container holds the whole history; any date resolves it.
        for observation in observations {
            validate_date("observation.time", observation.date())?;
        }
        let first = observations[0].date();
        partitions.insert(first, observations.to_vec());
        Ok(partitions)
    }

    fn write_partition(
        &self,
        date: NaiveDate,
        batch: &[Observation],
    ) -> Result<Option<PathBuf>, StoreError> {
        let resolved = self.resolve(date)?;
        let lines = self.codec.encode(batch, self.resolution, self.kind)?;

        let outcome = self.locks.with_lock(&resolved.container, || {
            self.archive
                .write(&resolved.container, &resolved.entry, &lines)
        })?;

        Ok((outcome != WriteOutcome::Skipped).then_some(resolved.container))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, Tick, TradeBar};
    use crate::storage::archive::read_all;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn spy() -> Instrument {
        Instrument::equity("SPY", "usa").unwrap()
    }

    #[test]
    fn test_empty_batch_writes_nothing() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::new(dir.path(), spy(), Resolution::Tick, DataKind::Trade);

        assert!(writer.write(&[]).unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_sub_daily_split_by_date() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::new(dir.path(), spy(), Resolution::Tick, DataKind::Trade);
        let ticks: Vec<Observation> = vec![
            Tick::new(at(2017, 3, 16, 15, 59, 59), dec!(10), dec!(1)).into(),
            Tick::new(at(2017, 3, 17, 9, 30, 0), dec!(11), dec!(2)).into(),
            Tick::new(at(2017, 3, 17, 9, 30, 1), dec!(12), dec!(3)).into(),
        ];

        let containers = writer.write(&ticks).unwrap();
        assert_eq!(containers.len(), 2);
        assert!(containers[0].ends_with("20170316_trade.zip"));
        assert!(containers[1].ends_with("20170317_trade.zip"));

        let second_day = writer
            .read(NaiveDate::from_ymd_opt(2017, 3, 17).unwrap())
            .unwrap();
        assert_eq!(second_day, ticks[1..].to_vec());
    }

    #[test]
    fn test_daily_goes_to_single_container() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::new(dir.path(), spy(), Resolution::Daily, DataKind::Trade);
        let bars: Vec<Observation> = (1..=3)
            .map(|d| {
                TradeBar {
                    time: at(2017, 3, d, 0, 0, 0),
                    bar: Bar::new(dec!(1), dec!(2), dec!(0.5), dec!(1.5)),
                    volume: dec!(100),
                }
                .into()
            })
            .collect();

        let containers = writer.write(&bars).unwrap();
        assert_eq!(containers.len(), 1);

        let entries = read_all(&containers[0]).unwrap();
        assert_eq!(entries["spy_trade.csv"].len(), 3);
        assert_eq!(entries["spy_trade.csv"][0], "20170301 00:00,1,2,0.5,1.5,100");
    }

    #[test]
    fn test_shape_mismatch_rejected_before_disk() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::new(dir.path(), spy(), Resolution::Minute, DataKind::Quote);
        let bar: Observation = TradeBar {
            time: at(2017, 3, 16, 12, 0, 0),
            bar: Bar::flat(dec!(1)),
            volume: dec!(1),
        }
        .into();

        let err = writer.write(&[bar]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidDescriptor { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_missing_container() {
        let dir = tempdir().unwrap();
        let writer = DataWriter::new(dir.path(), spy(), Resolution::Minute, DataKind::Trade);
        let err = writer
            .read(NaiveDate::from_ymd_opt(2017, 3, 16).unwrap())
            .unwrap_err();
        assert!(matches!(err, StoreError::ContainerNotFound { .. }));
    }
}
