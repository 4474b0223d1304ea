//! 变换的持久化存储.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use super::{Parameters, Similarity3d};
use crate::{BerryError, Result};

/// 相似变换的可序列化形式: 扁平参数 + 中心.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    /// `[qx, qy, qz, tx, ty, tz, s]`.
    pub parameters: Parameters,

    /// 旋转与缩放中心.
    pub center: [f64; 3],
}

impl From<&Similarity3d> for TransformRecord {
    fn from(t: &Similarity3d) -> Self {
        Self {
            parameters: t.parameters(),
            center: t.center().coords.into(),
        }
    }
}

impl TryFrom<TransformRecord> for Similarity3d {
    type Error = BerryError;

    fn try_from(r: TransformRecord) -> Result<Self> {
        let mut t = Similarity3d::identity();
        t.set_parameters(&r.parameters)?;
        t.set_center(Point3::from(r.center));
        Ok(t)
    }
}

/// 以 bincode 格式保存变换.
pub fn save_transform<P: AsRef<Path>>(path: P, transform: &Similarity3d) -> Result<()> {
    let path = path.as_ref();
    let write = || -> Result<()> {
        let w = BufWriter::new(File::create(path)?);
        bincode::serialize_into(w, &TransformRecord::from(transform))?;
        Ok(())
    };
    write().map_err(|e| BerryError::write_failed(path, e))
}

/// 读取 [`save_transform`] 保存的变换.
pub fn load_transform<P: AsRef<Path>>(path: P) -> Result<Similarity3d> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(BerryError::FileNotFound(path.to_owned()));
    }
    let r = BufReader::new(File::open(path)?);
    let record: TransformRecord = bincode::deserialize_from(r)?;
    record.try_into()
}
