//! CSV output sink with automatic file rotation.
//!
//! Frames are appended by the driver thread only. Files rotate at tick
//! boundaries: the line limit is checked after the tick separator so a tick's
//! rows never straddle two part files.

use anyhow::{Context, Result};
use csv::{Writer, WriterBuilder};
use log::info;
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::particle::{Particle, Shape};

const MAX_LINES_PER_FILE: usize = 100_000;
const SEPARATOR: &str = "########################################";

pub struct CsvSink {
    base: PathBuf,
    writer: Writer<File>,
    line_count: usize,
    part: u32,
    max_lines: usize,
}

impl CsvSink {
    /// Opens `<base>_part_001.csv` and writes the header row.
    pub fn create(base: impl Into<PathBuf>) -> Result<Self> {
        Self::with_line_limit(base, MAX_LINES_PER_FILE)
    }

    /// Test hook: same sink with a reduced rotation threshold.
    pub(crate) fn with_line_limit(base: impl Into<PathBuf>, max_lines: usize) -> Result<Self> {
        let base = base.into();
        let writer = open_part(&base, 1)?;
        let mut sink = CsvSink {
            base,
            writer,
            line_count: 0,
            part: 1,
            max_lines,
        };
        sink.write_header()?;
        Ok(sink)
    }

    fn write_header(&mut self) -> Result<()> {
        self.writer.write_record([
            "agent_id",
            "tick_num",
            "agent_type",
            "pos_X",
            "pos_Y",
            "diameter",
            "length",
            "orientation_X",
            "orientation_Y",
        ])?;
        self.line_count += 1;
        Ok(())
    }

    /// Writes one row per particle in list order followed by the tick
    /// separator, then rotates if the current file reached the line limit.
    pub fn write_frame(&mut self, tick: u64, particles: &[Particle]) -> Result<()> {
        for p in particles {
            let (kind, diameter, length) = match p.shape {
                Shape::Cell { length } => ("cell", p.diameter, length),
                Shape::Eps { radius } => ("eps", 2.0 * radius, 0.0),
            };
            self.writer.write_record([
                p.id.to_string(),
                tick.to_string(),
                kind.to_string(),
                p.position.x.to_string(),
                p.position.y.to_string(),
                diameter.to_string(),
                length.to_string(),
                p.orientation.x.to_string(),
                p.orientation.y.to_string(),
            ])?;
            self.line_count += 1;
        }
        self.writer.write_record([SEPARATOR])?;
        self.line_count += 1;

        if self.line_count >= self.max_lines {
            self.rotate()?;
        }
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.part += 1;
        self.writer = open_part(&self.base, self.part)?;
        self.line_count = 0;
        self.write_header()
    }

    /// Flushes and reports the files written.
    pub fn finish(mut self) -> Result<()> {
        self.writer.flush()?;
        info!(
            "Output writing complete: {} part file(s), {} lines in the final file.",
            self.part, self.line_count
        );
        Ok(())
    }
}

fn open_part(base: &Path, part: u32) -> Result<Writer<File>> {
    let path = PathBuf::from(format!("{}_part_{:03}.csv", base.display(), part));
    let file = File::create(&path)
        .with_context(|| format!("failed to create output file '{}'", path.display()))?;
    // Separator rows have a single field, so the writer must be flexible.
    Ok(WriterBuilder::new().flexible(true).from_writer(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use biofilm_common::Vec2;
    use std::fs;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("biofilm-output-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_particles() -> Vec<Particle> {
        vec![
            Particle::cell(0, 1.0, Vec2::new(1.5, 2.5), Vec2::new(1.0, 0.0), 3.0),
            Particle::eps(10_000, Vec2::new(-1.0, 0.5), Vec2::new(0.0, 1.0), 0.25),
        ]
    }

    #[test]
    fn frame_layout_matches_the_contract() {
        let dir = scratch_dir("layout");
        let base = dir.join("simulation_output");
        let mut sink = CsvSink::create(&base).unwrap();
        sink.write_frame(0, &sample_particles()).unwrap();
        sink.finish().unwrap();

        let text = fs::read_to_string(dir.join("simulation_output_part_001.csv")).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "agent_id,tick_num,agent_type,pos_X,pos_Y,diameter,length,orientation_X,orientation_Y"
        );
        assert_eq!(lines[1], "0,0,cell,1.5,2.5,1,3,1,0");
        // EPS rows report diameter = 2 * radius and zero length.
        assert_eq!(lines[2], "10000,0,eps,-1,0.5,0.5,0,0,1");
        assert_eq!(lines[3], SEPARATOR);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn rotation_happens_only_after_a_separator() {
        let dir = scratch_dir("rotation");
        let base = dir.join("simulation_output");
        // Header + 2 rows + separator = 4 lines per frame; limit 5 forces a
        // rotation after the second frame's separator.
        let mut sink = CsvSink::with_line_limit(&base, 5).unwrap();
        sink.write_frame(0, &sample_particles()).unwrap();
        assert!(!dir.join("simulation_output_part_002.csv").exists());
        sink.write_frame(1, &sample_particles()).unwrap();
        sink.write_frame(2, &sample_particles()).unwrap();
        sink.finish().unwrap();

        let part1 = fs::read_to_string(dir.join("simulation_output_part_001.csv")).unwrap();
        let part2 = fs::read_to_string(dir.join("simulation_output_part_002.csv")).unwrap();
        // Ticks 0 and 1 in the first part, tick 2 in the second.
        assert!(part1.contains(",1,cell,"));
        assert!(!part1.contains(",2,cell,"));
        assert!(part2.starts_with("agent_id,"));
        assert!(part2.contains(",2,cell,"));

        let _ = fs::remove_dir_all(&dir);
    }
}
