//! Run orchestration: filter, sort, chunk, render, compose and save one tag document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::compose::{compose_documents, derive_blank_page};
use crate::conf::{
    TUP_LINEAGE_SORT_ORDER, calculate_slots_per_page, derive_font_scheme, derive_grid_shape,
};
use crate::docx::{SpecDocxPackage, load_docx, save_docx_bytes};
use crate::document::SpecDocument;
use crate::grid::expand_template;
use crate::normalize::derive_combined_weight;
use crate::render::{render_back_page, render_chunk};
use crate::report::{ReportRun, ReportRunBuilder};
use crate::spec::{
    EnumOrientation, LabelError, SpecLabelAssets, SpecLabelRecord, SpecRecordFilters,
    SpecRunOptions,
};
use crate::template::derive_prototype_document;
use crate::util::{chunk_records, sanitize_file_fragment};

/// Filter value meaning "no filter".
const C_FILTER_ALL: &str = "All";

////////////////////////////////////////////////////////////////////////////////
// #region LockRelease

/// Releases a foreign lock on an output file (e.g. closes the document in the
/// word processor holding it open) before the single save retry.
pub trait FileLockReleaser: Send + Sync {
    fn release(&self, path: &Path) -> Result<(), String>;
}

/// Releaser that does nothing; the retry still happens.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLockReleaser;

impl FileLockReleaser for NoopLockReleaser {
    fn release(&self, _path: &Path) -> Result<(), String> {
        Ok(())
    }
}

/// Write through `write_fn`; a permission failure triggers one release and one retry.
///
/// Returns the number of retries performed (0 or 1).
fn write_with_lock_retry<F>(
    path: &Path,
    lock_releaser: &dyn FileLockReleaser,
    mut write_fn: F,
) -> Result<u64, LabelError>
where
    F: FnMut(&Path) -> io::Result<()>,
{
    let to_io = |err: io::Error| LabelError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    match write_fn(path) {
        Ok(()) => Ok(0),
        Err(err) if err.kind() == io::ErrorKind::PermissionDenied => {
            tracing::warn!(
                "Output {} is locked ({err}); releasing and retrying once.",
                path.display()
            );
            if let Err(msg) = lock_releaser.release(path) {
                tracing::warn!("Lock release failed for {}: {msg}", path.display());
            }
            write_fn(path).map_err(to_io)?;
            Ok(1)
        }
        Err(err) => Err(to_io(err)),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Selection

fn derive_active_filters(filters: &SpecRecordFilters) -> Vec<(usize, String)> {
    [
        &filters.product_type,
        &filters.lineage,
        &filters.brand,
        &filters.vendor,
        &filters.weight,
        &filters.strain,
    ]
    .into_iter()
    .enumerate()
    .filter_map(|(idx, value)| {
        let c_value = value.as_deref()?.trim();
        if c_value.is_empty() || c_value.eq_ignore_ascii_case(C_FILTER_ALL) {
            None
        } else {
            Some((idx, c_value.to_string()))
        }
    })
    .collect()
}

fn derive_filter_field(record: &SpecLabelRecord, n_idx_filter: usize) -> String {
    match n_idx_filter {
        0 => record.product_type.clone(),
        1 => record.lineage.as_str().to_string(),
        2 => record.product_brand.clone(),
        3 => record.vendor.clone(),
        4 => derive_combined_weight(record.weight, &record.units),
        _ => record.product_strain.as_str().to_string(),
    }
}

/// Keep records matching every active filter (trimmed, case-insensitive equality).
pub fn filter_records(records: &[SpecLabelRecord], filters: &SpecRecordFilters) -> Vec<SpecLabelRecord> {
    let l_active = derive_active_filters(filters);
    records
        .iter()
        .filter(|record| {
            l_active.iter().all(|(n_idx, c_value)| {
                derive_filter_field(record, *n_idx)
                    .trim()
                    .eq_ignore_ascii_case(c_value)
            })
        })
        .cloned()
        .collect()
}

/// Sort by the tag lineage order, then by product name.
pub fn sort_records(records: &mut [SpecLabelRecord]) {
    let rank = |record: &SpecLabelRecord| {
        TUP_LINEAGE_SORT_ORDER
            .iter()
            .position(|lineage| *lineage == record.lineage)
            .unwrap_or(TUP_LINEAGE_SORT_ORDER.len())
    };
    records.sort_by(|a, b| {
        rank(a)
            .cmp(&rank(b))
            .then_with(|| a.product_name.cmp(&b.product_name))
    });
}

/// Underscore-joined active filter values with unsafe characters removed, or `all`.
pub fn derive_filter_suffix(filters: &SpecRecordFilters) -> String {
    let l_parts: Vec<String> = derive_active_filters(filters)
        .into_iter()
        .map(|(_, c_value)| sanitize_file_fragment(&c_value))
        .filter(|c_part| !c_part.is_empty())
        .collect();
    if l_parts.is_empty() {
        "all".to_string()
    } else {
        l_parts.join("_")
    }
}

/// `{dir}/{date}_{orientation}_{suffix}_tags.docx`.
pub fn derive_output_path(options: &SpecRunOptions) -> PathBuf {
    let c_date = options
        .date_stamp
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    options.dir_out.join(format!(
        "{c_date}_{}_{}_tags.docx",
        options.orientation,
        derive_filter_suffix(&options.filters)
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Run

/// Template package (custom or built-in) and the page grid derived from it.
fn derive_grid(
    options: &SpecRunOptions,
) -> Result<(Option<SpecDocxPackage>, SpecDocument), LabelError> {
    let orientation = options.orientation;
    let (package, prototype) = match &options.path_template {
        Some(path) => {
            let package = load_docx(path).map_err(|message| LabelError::Io {
                path: path.clone(),
                message,
            })?;
            let prototype = package.document.clone();
            (Some(package), prototype)
        }
        None => (None, derive_prototype_document(orientation)),
    };
    let grid = match derive_grid_shape(orientation) {
        Some(shape) => expand_template(&prototype, &shape).map_err(LabelError::Render)?,
        None => {
            if prototype.position_first_table().is_none() {
                return Err(LabelError::Render(
                    "Template must contain at least one table.".to_string(),
                ));
            }
            prototype
        }
    };
    Ok((package, grid))
}

fn render_chunks(
    l_chunks: &[Vec<SpecLabelRecord>],
    grid: &SpecDocument,
    options: &SpecRunOptions,
    assets: &SpecLabelAssets,
    builder: &mut ReportRunBuilder,
) -> Result<Vec<SpecDocument>, LabelError> {
    let scheme = derive_font_scheme(options.orientation);
    let render_one =
        |chunk: &Vec<SpecLabelRecord>| render_chunk(chunk, grid, &scheme, options.scale_factor, assets);

    let thread_pool = ThreadPoolBuilder::new()
        .num_threads(options.n_workers_max)
        .build();
    let l_results: Vec<Result<SpecDocument, String>> = match thread_pool {
        Ok(thread_pool) => thread_pool.install(|| l_chunks.par_iter().map(render_one).collect()),
        Err(err) => {
            builder.add_warning(format!(
                "Failed to initialize thread pool (workers={}): {err}; fallback to serial render.",
                options.n_workers_max
            ));
            l_chunks.iter().map(render_one).collect()
        }
    };
    l_results
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(LabelError::Render)
}

/// Page sequence: fronts in chunk order with blank or back pages interleaved.
fn derive_page_sequence(
    l_fronts: Vec<SpecDocument>,
    l_chunks: &[Vec<SpecLabelRecord>],
    grid: &SpecDocument,
    options: &SpecRunOptions,
) -> Result<Vec<SpecDocument>, LabelError> {
    let orientation = options.orientation;
    let if_back = options.if_print_vendor_back
        && matches!(
            orientation,
            EnumOrientation::Horizontal | EnumOrientation::Vertical
        );
    let n_fronts = l_fronts.len();
    let mut l_pages = Vec::with_capacity(n_fronts * 2);
    for (idx, (front, chunk)) in l_fronts.into_iter().zip(l_chunks).enumerate() {
        l_pages.push(front);
        if if_back {
            l_pages.push(render_back_page(chunk, grid).map_err(LabelError::Render)?);
        }
        // Every mini front after the first is followed by a blank back side.
        if orientation == EnumOrientation::Mini && idx > 0 {
            l_pages.push(derive_blank_page());
        }
    }
    Ok(l_pages)
}

/// Generate one tag document from an already selected record sequence.
///
/// Steps:
/// 1. Filter, sort and chunk the records.
/// 2. Build the page grid once from the custom or built-in template.
/// 3. Render chunks in parallel (serial fallback when no pool can be built).
/// 4. Compose pages in chunk order with blank/back pages.
/// 5. Save, releasing a foreign lock and retrying once on permission errors.
///
/// Nothing is written unless every step before the save succeeds.
pub fn run_generate(
    records: &[SpecLabelRecord],
    options: &SpecRunOptions,
    assets: &SpecLabelAssets,
    lock_releaser: &dyn FileLockReleaser,
) -> Result<ReportRun, LabelError> {
    if records.is_empty() {
        return Err(LabelError::EmptySelection);
    }
    let mut builder = ReportRunBuilder {
        cnt_records: records.len() as u64,
        ..ReportRunBuilder::default()
    };

    let mut l_records = filter_records(records, &options.filters);
    if l_records.is_empty() {
        return Err(LabelError::EmptyFilterResult);
    }
    sort_records(&mut l_records);
    builder.cnt_filtered = l_records.len() as u64;

    let n_slots = calculate_slots_per_page(options.orientation);
    let l_chunks = chunk_records(&l_records, n_slots);
    builder.cnt_chunks = l_chunks.len() as u64;
    tracing::info!(
        "Rendering {} records in {} chunks of {n_slots} ({}).",
        l_records.len(),
        l_chunks.len(),
        options.orientation
    );

    let (package_template, grid) = derive_grid(options)?;
    let l_fronts = render_chunks(&l_chunks, &grid, options, assets, &mut builder)?;
    let l_pages = derive_page_sequence(l_fronts, &l_chunks, &grid, options)?;
    let composed = compose_documents(l_pages).map_err(LabelError::Render)?;
    builder.cnt_pages = composed.count_pages() as u64;

    let package = match &package_template {
        Some(package) => package.with_document(composed),
        None => SpecDocxPackage::new_blank(composed),
    };
    let v_bytes = save_docx_bytes(&package).map_err(LabelError::Render)?;

    let path_out = derive_output_path(options);
    fs::create_dir_all(&options.dir_out).map_err(|err| LabelError::Io {
        path: options.dir_out.clone(),
        message: err.to_string(),
    })?;
    builder.cnt_lock_retries =
        write_with_lock_retry(&path_out, lock_releaser, |path| fs::write(path, &v_bytes))?;
    tracing::info!("Saved tags to {}.", path_out.display());
    builder.path_output = Some(path_out);
    Ok(builder.build())
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
