//! 结果输出.

use std::io::{self, Write};

use grain_berry::registration::RegistrationResult;
use grain_berry::transform::Similarity3d;

const S4: &str = "    ";

/// 将变换的各分量写进 `w` 中.
pub fn describe_transform<W: Write>(t: &Similarity3d, w: &mut W) -> io::Result<()> {
    let q = t.versor();
    let tr = t.translation();
    writeln!(w, "Versor: [{:.6}, {:.6}, {:.6}, {:.6}]", q.i, q.j, q.k, q.w)?;
    writeln!(w, "Translation: [{:.6}, {:.6}, {:.6}]", tr.x, tr.y, tr.z)?;
    writeln!(w, "Scale: {:.6}", t.scale())?;

    let c = t.center();
    writeln!(w, "Center: [{:.6}, {:.6}, {:.6}]", c.x, c.y, c.z)?;

    let m = t.matrix();
    writeln!(w, "Matrix:")?;
    for r in 0..3 {
        writeln!(
            w,
            "{S4}{:>12.6} {:>12.6} {:>12.6}",
            m[(r, 0)],
            m[(r, 1)],
            m[(r, 2)]
        )?;
    }
    let o = t.offset();
    writeln!(w, "Offset: [{:.6}, {:.6}, {:.6}]", o.x, o.y, o.z)
}

/// 将配准结果写进 `w` 中.
pub fn describe_registration<W: Write>(r: &RegistrationResult, w: &mut W) -> io::Result<()> {
    writeln!(w, "Result:")?;
    describe_transform(&r.transform, w)?;
    writeln!(w, "Iterations: {}", r.iterations)?;
    writeln!(w, "Metric value: {:.6}", r.value)?;
    if r.levels.len() > 1 {
        for l in &r.levels {
            writeln!(
                w,
                "{S4}level {} ({}): {} iterations, value {:.6}, {}",
                l.level, l.pyramid, l.iterations, l.value, l.stop
            )?;
        }
    }
    writeln!(w, "Stop condition: {}", r.description)
}

/// 打印配准结果到标准输出.
pub fn print_registration(r: &RegistrationResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    super::sep_to(&mut lock)?;
    describe_registration(r, &mut lock)?;
    super::sep_to(&mut lock)
}
