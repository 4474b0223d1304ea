//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{BerryError, ErrorKind, Geometry, IntensityWindow, Result, Sample, Volume};

pub use crate::consts::gray::{BACKGROUND, FOREGROUND};
pub use crate::consts::MIN_OBJECT_SIZE;

pub use crate::filter::{
    binary_threshold, convert_bit_depth, gaussian_smooth, resample, resample_like,
    rescale_intensity, rotate_about_center, shrink, shrink_uniform, sigmoid, RescaleMode,
};

pub use crate::io::{
    export_series, prepare_output_dir, read_series, read_series_chunks, read_volume,
    write_series, write_volume, NpyChunkWriter, PointSet, RuntimeConfig, SeriesFileNames,
    StreamPlan,
};

pub use crate::morph::{segment, threshold_mask, Connectivity, Reconstruction, SegmentParams};

pub use crate::registration::{
    initialize_by_geometric_centers, initialize_point_sets, initialize_with,
    register_point_sets, CenterMode, ImageRegistration, OptimizerConfig, PyramidLevel,
    RegistrationResult, RegularStepGradientDescent, Sampling, StopCondition,
};

pub use crate::transform::{Parameters, Similarity3d};

#[cfg(feature = "serde")]
pub use crate::transform::{load_transform, save_transform};
