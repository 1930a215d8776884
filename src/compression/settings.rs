//! Compression settings: storage formats, search level, optional metadata.

use crate::error::CompressError;
use crate::format::{CompressionLevel, RotationFormat, VectorFormat};

/// Which optional metadata sections the writer appends after the clip data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetadataSettings {
    /// Per-sample worst contributing error, required for database extraction.
    pub include_contributing_error: bool,
    /// The track array's name.
    pub include_track_list_name: bool,
    /// Every track's name.
    pub include_track_names: bool,
    /// Every track's parent index.
    pub include_parent_track_indices: bool,
    /// Every track's description record (precision, shell distance,
    /// constant thresholds). Implies `include_parent_track_indices`.
    pub include_track_descriptions: bool,
}

impl MetadataSettings {
    pub fn any(&self) -> bool {
        self.include_contributing_error
            || self.include_track_list_name
            || self.include_track_names
            || self.include_parent_track_indices
            || self.include_track_descriptions
    }
}

/// Settings controlling a transform clip compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressionSettings {
    pub rotation_format: RotationFormat,
    pub translation_format: VectorFormat,
    pub scale_format: VectorFormat,
    /// Aggressiveness of the bit-rate search.
    pub level: CompressionLevel,
    /// Reserves the metadata a database side-car needs; forces
    /// `include_contributing_error`.
    pub enable_database_support: bool,
    pub metadata: MetadataSettings,
}

impl Default for CompressionSettings {
    fn default() -> Self {
        CompressionSettings {
            rotation_format: RotationFormat::QuatDropWVariable,
            translation_format: VectorFormat::Variable,
            scale_format: VectorFormat::Variable,
            level: CompressionLevel::Medium,
            enable_database_support: false,
            metadata: MetadataSettings::default(),
        }
    }
}

impl CompressionSettings {
    /// True when at least one sub-track format uses variable bit rates.
    pub fn any_variable(&self) -> bool {
        self.rotation_format.is_variable()
            || self.translation_format.is_variable()
            || self.scale_format.is_variable()
    }

    /// Checks the settings for internal consistency.
    pub fn is_valid(&self) -> Result<(), CompressError> {
        let wants_contributing_error =
            self.metadata.include_contributing_error || self.enable_database_support;
        if wants_contributing_error && !self.any_variable() {
            return Err(CompressError::InvalidSettings(
                "raw tracks have no contributing error",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        assert!(CompressionSettings::default().is_valid().is_ok());
    }

    #[test]
    fn contributing_error_rejects_all_raw_formats() {
        let settings = CompressionSettings {
            rotation_format: RotationFormat::QuatFull,
            translation_format: VectorFormat::Full,
            scale_format: VectorFormat::Full,
            metadata: MetadataSettings { include_contributing_error: true, ..Default::default() },
            ..Default::default()
        };
        assert!(settings.is_valid().is_err());

        // Database support implies the same requirement.
        let settings = CompressionSettings {
            rotation_format: RotationFormat::QuatFull,
            translation_format: VectorFormat::Full,
            scale_format: VectorFormat::Full,
            enable_database_support: true,
            ..Default::default()
        };
        assert!(settings.is_valid().is_err());
    }
}
