use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use tagkit_label::normalize::derive_combined_weight;
use tagkit_label::{
    EnumOrientation, LabelError, NoopLockReleaser, SelectionState, SpecFeedMatchOptions,
    SpecImageAsset, SpecLabelAssets, SpecLabelRecord, SpecRecordFilters, SpecRunOptions,
    load_records, match_feed_json, run_generate,
};

const N_BRIDGE_ABI_VERSION: u64 = 1;
const C_BRIDGE_CONTRACT_VERSION: &str = "tagkit.label.v1";
const C_BRIDGE_TRANSPORT: &str = "rust_native";

fn map_label_error(exception: LabelError) -> PyErr {
    match exception {
        LabelError::Input(_)
        | LabelError::EmptySelection
        | LabelError::EmptyFilterResult
        | LabelError::Feed(_) => PyValueError::new_err(exception.to_string()),
        LabelError::Render(_) | LabelError::Io { .. } => {
            PyRuntimeError::new_err(exception.to_string())
        }
    }
}

fn convert_record_to_dict(record: &SpecLabelRecord) -> BTreeMap<String, String> {
    let mut dict_record = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        dict_record.insert(key.to_string(), value);
    };
    put("Product Name*", record.product_name.clone());
    put("Description", record.description.clone());
    put("Product Type*", record.product_type.clone());
    put("Lineage", record.lineage.to_string());
    put("Product Strain", record.product_strain.to_string());
    put("Product Brand", record.product_brand.clone());
    put("Vendor", record.vendor.clone());
    put("Price", record.price.clone());
    put("Units", record.units.clone());
    put(
        "CombinedWeight",
        derive_combined_weight(record.weight, &record.units),
    );
    put("Ratio", record.ratio.clone());
    put("DOH", record.doh.clone());
    put("Barcode*", record.barcode.clone());
    put("Accepted Date", record.accepted_date.clone());
    put("Quantity Received*", record.quantity_received.clone());
    dict_record
}

fn parse_filters(filters: Option<BTreeMap<String, String>>) -> PyResult<SpecRecordFilters> {
    let mut spec_filters = SpecRecordFilters::default();
    for (key, value) in filters.unwrap_or_default() {
        let slot = match key.as_str() {
            "product_type" => &mut spec_filters.product_type,
            "lineage" => &mut spec_filters.lineage,
            "brand" => &mut spec_filters.brand,
            "vendor" => &mut spec_filters.vendor,
            "weight" => &mut spec_filters.weight,
            "strain" => &mut spec_filters.strain,
            _ => {
                return Err(PyValueError::new_err(format!(
                    "Invalid filter: `{key}`. Expected one of: ['product_type', 'lineage', 'brand', 'vendor', 'weight', 'strain']"
                )));
            }
        };
        *slot = Some(value);
    }
    Ok(spec_filters)
}

fn read_png_asset(path: Option<String>, name: &str) -> PyResult<Option<SpecImageAsset>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let v_bytes = fs::read(&path)
        .map_err(|err| PyValueError::new_err(format!("Failed to read image {path}: {err}")))?;
    SpecImageAsset::from_png_bytes(name, v_bytes)
        .map(Some)
        .map_err(map_label_error)
}

#[pyfunction(name = "load_records")]
fn load_records_py(py: Python<'_>, path: String) -> PyResult<Vec<BTreeMap<String, String>>> {
    let l_records = py
        .allow_threads(|| load_records(Path::new(&path), None))
        .map_err(map_label_error)?;
    Ok(l_records.iter().map(convert_record_to_dict).collect())
}

#[pyfunction(name = "generate_tags")]
#[pyo3(signature = (
    path_in,
    dir_out,
    orientation = "horizontal",
    scale_factor = 1.0,
    names_selected = None,
    filters = None,
    if_print_vendor_back = false,
    path_doh_image = None,
    path_high_cbd_image = None
))]
#[allow(clippy::too_many_arguments)]
fn generate_tags_py(
    py: Python<'_>,
    path_in: String,
    dir_out: String,
    orientation: &str,
    scale_factor: f64,
    names_selected: Option<Vec<String>>,
    filters: Option<BTreeMap<String, String>>,
    if_print_vendor_back: bool,
    path_doh_image: Option<String>,
    path_high_cbd_image: Option<String>,
) -> PyResult<String> {
    let orientation: EnumOrientation = orientation.parse().map_err(PyValueError::new_err)?;
    let spec_run_options = SpecRunOptions {
        orientation,
        scale_factor,
        if_print_vendor_back,
        filters: parse_filters(filters)?,
        dir_out: PathBuf::from(dir_out),
        ..SpecRunOptions::default()
    };
    let assets = SpecLabelAssets {
        image_doh: read_png_asset(path_doh_image, "doh.png")?,
        image_high_cbd: read_png_asset(path_high_cbd_image, "high_cbd.png")?,
    };

    let report_run = py
        .allow_threads(|| {
            let l_records = load_records(Path::new(&path_in), None)?;
            let l_selected = match &names_selected {
                Some(names) => {
                    let mut state = SelectionState::from_records(&l_records);
                    state.move_to_selected(names);
                    state.order_selected(&l_records)
                }
                None => l_records,
            };
            run_generate(&l_selected, &spec_run_options, &assets, &NoopLockReleaser)
        })
        .map_err(map_label_error)?;

    let path_output = report_run
        .path_output
        .ok_or_else(|| PyRuntimeError::new_err("Run finished without an output file."))?;
    Ok(path_output.to_string_lossy().to_string())
}

#[pyfunction(name = "match_feed")]
#[pyo3(signature = (path_in, feed_json, if_include_prefiltered = true))]
fn match_feed_py(
    py: Python<'_>,
    path_in: String,
    feed_json: String,
    if_include_prefiltered: bool,
) -> PyResult<Vec<String>> {
    let options = SpecFeedMatchOptions {
        if_include_prefiltered,
    };
    py.allow_threads(|| {
        let l_records = load_records(Path::new(&path_in), None)?;
        match_feed_json(&l_records, &feed_json, &options)
    })
    .map_err(map_label_error)
}

#[pymodule]
fn _tagkit_label_rs(module: &Bound<'_, PyModule>) -> PyResult<()> {
    module.add_function(wrap_pyfunction!(load_records_py, module)?)?;
    module.add_function(wrap_pyfunction!(generate_tags_py, module)?)?;
    module.add_function(wrap_pyfunction!(match_feed_py, module)?)?;
    module.add("__bridge_abi__", N_BRIDGE_ABI_VERSION)?;
    module.add("__bridge_contract__", C_BRIDGE_CONTRACT_VERSION)?;
    module.add("__bridge_transport__", C_BRIDGE_TRANSPORT)?;
    Ok(())
}
