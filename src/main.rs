use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::info;

use voronoi_isosurface::diagnostics::{write_voronoi_csv, write_voronoi_log};
use voronoi_isosurface::grid::nrrd;
use voronoi_isosurface::mesh::{write_mesh, MeshFormat, PlyEncoding};
use voronoi_isosurface::{
    extract, CellConstruction, ExtractionConfigBuilder, IsovertexMode, Separation,
};

/// Extract an isosurface from an NRRD volume by Voronoi dual contouring
#[derive(Parser)]
#[clap(author, version, about, long_about = None, allow_negative_numbers = true)]
struct Args {
    /// Isovalue to extract
    isovalue: f32,

    /// Input `.nrrd` volume
    input: PathBuf,

    /// Output format (`off` or `ply`)
    format: String,

    /// Output mesh file
    output: PathBuf,

    /// Place one vertex per surface sheet in each Voronoi cell
    #[clap(long)]
    multi: bool,

    /// Keep only active cubes that are not lattice-adjacent
    #[clap(long = "sep-isov")]
    sep_isov: bool,

    /// How `--sep-isov` picks the kept cubes
    #[clap(long = "sep-method", value_enum, default_value_t = SepMethod::Greedy)]
    sep_method: SepMethod,

    /// Supersample the field by this factor before extraction
    #[clap(long)]
    supersample: Option<u32>,

    /// Write Voronoi vertices and edges to a CSV file
    #[clap(long = "out-csv")]
    out_csv: Option<PathBuf>,

    /// Write a human-readable dump of the Voronoi diagram
    #[clap(long = "dump-log")]
    dump_log: Option<PathBuf>,

    /// How multi-mode Voronoi cells are built
    #[clap(long, value_enum, default_value_t = CellMode::Star)]
    cell_construction: CellMode,

    /// Write PLY output in binary little-endian encoding
    #[clap(long)]
    binary: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum CellMode {
    Star,
    Hull,
}

#[derive(ValueEnum, Clone, Copy)]
enum SepMethod {
    Greedy,
    Coloring,
}

impl From<SepMethod> for Separation {
    fn from(method: SepMethod) -> Self {
        match method {
            SepMethod::Greedy => Separation::Greedy,
            SepMethod::Coloring => Separation::Coloring,
        }
    }
}

impl From<CellMode> for CellConstruction {
    fn from(mode: CellMode) -> Self {
        match mode {
            CellMode::Star => CellConstruction::DelaunayStar,
            CellMode::Hull => CellConstruction::ConvexHull,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let format: MeshFormat = args.format.parse()?;
    if args.binary && format != MeshFormat::Ply {
        bail!("--binary only applies to ply output");
    }

    let mut builder = ExtractionConfigBuilder::new()
        .isovalue(args.isovalue)?
        .mode(if args.multi {
            IsovertexMode::Multi
        } else {
            IsovertexMode::Single
        })
        .separate_active(args.sep_isov)
        .separation(args.sep_method.into())
        .cell_construction(args.cell_construction.into());
    if let Some(factor) = args.supersample {
        builder = builder.supersample(factor)?;
    }
    let config = builder.build()?;

    let now = Instant::now();
    let grid = nrrd::load(&args.input)?;
    let [nx, ny, nz] = grid.dims();
    info!(
        "Loaded {}x{}x{} grid from {} in {:?}",
        nx,
        ny,
        nz,
        args.input.display(),
        now.elapsed()
    );

    let start = Instant::now();
    let extraction = extract(&grid, &config)?;
    info!("Extracted isosurface in {:?}", start.elapsed());

    if let Some(diagram) = &extraction.diagram {
        if let Some(path) = &args.out_csv {
            write_voronoi_csv(diagram, &extraction.bbox, BufWriter::new(File::create(path)?))?;
            info!("Wrote Voronoi CSV to {}", path.display());
        }
        if let Some(path) = &args.dump_log {
            write_voronoi_log(diagram, BufWriter::new(File::create(path)?))?;
            info!("Wrote Voronoi dump to {}", path.display());
        }
    } else if args.out_csv.is_some() || args.dump_log.is_some() {
        info!("No active cubes, skipping Voronoi diagnostics");
    }

    let encoding = if args.binary {
        PlyEncoding::BinaryLittleEndian
    } else {
        PlyEncoding::Ascii
    };
    write_mesh(&extraction.surface, &args.output, format, encoding)?;
    Ok(())
}
