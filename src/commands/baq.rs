//! Apply BAQ quality capping to a BAM file.
//!
//! Streams a BAM, runs the BAQ calculation on each eligible record, and
//! writes the result. Reads that are unmapped, duplicates, or failing vendor
//! quality checks pass through unchanged, as do reads whose widened
//! reference window falls off the end of the contig.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use fgbaq_lib::baq::{BaqCalculator, CalculationMode, QualityMode, exclude_read_from_baq};
use fgbaq_lib::bam_io::{create_bam_reader, create_bam_writer};
use fgbaq_lib::hmm::{
    DEFAULT_BAND_WIDTH, DEFAULT_GAP_EXTEND, DEFAULT_GAP_OPEN, DEFAULT_MIN_BASE_QUAL,
};
use fgbaq_lib::progress::{OperationTimer, ProgressTracker, format_count};
use fgbaq_lib::reference::ReferenceReader;
use fgbaq_lib::validation::{validate_file_exists, validate_probability};
use log::{info, warn};
use noodles::sam::alignment::io::Write as AlignmentWrite;
use std::path::PathBuf;

use crate::commands::command::Command;

/// When to run the HMM for a read.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CalculationModeArg {
    /// Do not apply BAQ at all (records pass through unchanged)
    None,
    /// Run the HMM only for reads without a BQ tag
    AsNecessary,
    /// Run the HMM for every read
    Recalculate,
}

impl From<CalculationModeArg> for CalculationMode {
    fn from(arg: CalculationModeArg) -> Self {
        match arg {
            CalculationModeArg::None => CalculationMode::None,
            CalculationModeArg::AsNecessary => CalculationMode::AsNecessary,
            CalculationModeArg::Recalculate => CalculationMode::Recalculate,
        }
    }
}

/// What to do with the computed qualities.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum QualityModeArg {
    /// Store the deltas in the BQ attribute, leaving QUAL alone
    AddTag,
    /// Overwrite the QUAL field directly
    OverwriteQuals,
    /// Compute but do not modify the records (useful for timing/validation)
    DontModify,
}

impl From<QualityModeArg> for QualityMode {
    fn from(arg: QualityModeArg) -> Self {
        match arg {
            QualityModeArg::AddTag => QualityMode::AddTag,
            QualityModeArg::OverwriteQuals => QualityMode::OverwriteQuals,
            QualityModeArg::DontModify => QualityMode::DontModify,
        }
    }
}

/// Apply BAQ quality capping to a BAM file.
#[derive(Debug, Parser)]
#[command(
    name = "baq",
    about = "Recalculate per-base qualities with the BAQ alignment-uncertainty model",
    long_about = r#"
Apply Base Alignment Quality (BAQ) capping to every record of a BAM file.

For each eligible read the tool fetches the reference window around the
alignment, runs a banded profile-HMM forward-backward pass, and caps each
base quality by the phred-scaled posterior probability that the base is
correctly placed. Bases near indels or in ambiguous stretches are
downweighted; confidently placed bases keep their raw quality.

Unmapped reads, duplicates, and reads failing vendor quality checks pass
through unchanged. Reads whose widened window would run past the contig end
are skipped (left unchanged), never failed.

QUALITY MODES:

  add-tag           Store per-base deltas in the BQ attribute (default).
                    Downstream tools can reconstruct the capped qualities
                    from QUAL and BQ.

  overwrite-quals   Replace QUAL with the capped qualities.

  dont-modify       Run the calculation but write records unchanged.

EXAMPLES:

  # Annotate reads with BQ tags where missing
  fgbaq baq -i in.bam -o out.bam -r ref.fa --calculation as-necessary

  # Recompute and overwrite qualities for all reads
  fgbaq baq -i in.bam -o out.bam -r ref.fa \
    --calculation recalculate --quality-mode overwrite-quals
"#
)]
pub struct Baq {
    /// Input BAM file.
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output BAM file.
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Reference FASTA file.
    #[arg(short = 'r', long = "reference")]
    pub reference: PathBuf,

    /// When to run the HMM.
    #[arg(long = "calculation", value_enum, default_value = "recalculate")]
    pub calculation: CalculationModeArg,

    /// What to do with the computed qualities.
    #[arg(long = "quality-mode", value_enum, default_value = "add-tag")]
    pub quality_mode: QualityModeArg,

    /// Gap open probability.
    #[arg(long = "gap-open", default_value_t = DEFAULT_GAP_OPEN)]
    pub gap_open: f64,

    /// Gap extension probability.
    #[arg(long = "gap-extension", default_value_t = DEFAULT_GAP_EXTEND)]
    pub gap_extension: f64,

    /// Band width of the HMM dynamic program.
    #[arg(long = "band-width", default_value_t = DEFAULT_BAND_WIDTH)]
    pub band_width: usize,

    /// Base qualities below this floor are raised to it before decoding.
    #[arg(long = "min-base-quality", default_value_t = DEFAULT_MIN_BASE_QUAL)]
    pub min_base_quality: u8,
}

impl Command for Baq {
    fn execute(&self, command_line: &str) -> Result<()> {
        validate_file_exists(&self.input, "Input BAM")?;
        validate_file_exists(&self.reference, "Reference FASTA")?;
        validate_probability(self.gap_open, "gap-open")?;
        validate_probability(self.gap_extension, "gap-extension")?;

        info!("Command line: {command_line}");
        info!("Input: {}", self.input.display());
        info!("Output: {}", self.output.display());
        info!("Reference: {}", self.reference.display());
        info!("Calculation: {:?}", self.calculation);
        info!("Quality mode: {:?}", self.quality_mode);

        let timer = OperationTimer::new("Applying BAQ");

        let reference = ReferenceReader::new(&self.reference)?;
        info!("Loaded {} reference contigs", reference.len());

        let (mut reader, header) = create_bam_reader(&self.input)?;
        let mut writer = create_bam_writer(&self.output, &header)?;

        let calculator = BaqCalculator::new(
            self.gap_open,
            self.gap_extension,
            self.band_width,
            self.min_base_quality,
        );
        let calculation = CalculationMode::from(self.calculation);
        let quality_mode = QualityMode::from(self.quality_mode);

        let tracker = ProgressTracker::new("Processed records");
        let mut total: u64 = 0;
        let mut excluded: u64 = 0;
        let mut failed: u64 = 0;

        for result in reader.record_bufs(&header) {
            let mut record = result?;
            total += 1;

            if exclude_read_from_baq(&record) {
                excluded += 1;
            } else if let Err(e) =
                calculator.baq_read(&mut record, &header, &reference, calculation, quality_mode)
            {
                let name = record
                    .name()
                    .map_or_else(|| "<unnamed>".to_string(), |n| n.to_string());
                warn!("BAQ failed for read '{name}', leaving it unchanged: {e}");
                failed += 1;
            }

            writer.write_alignment_record(&header, &record)?;
            tracker.log_if_needed(1);
        }
        tracker.log_final();
        writer.get_mut().try_finish()?;

        info!("=== Summary ===");
        info!("Records processed: {}", format_count(total));
        info!("Records excluded: {}", format_count(excluded));
        if failed > 0 {
            info!("Records failed (passed through): {}", format_count(failed));
        }
        info!("Output: {}", self.output.display());
        timer.log_completion(total);

        Ok(())
    }
}
