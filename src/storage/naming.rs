//! Object key conventions for uploaded and consolidated workbooks.

const INPUT_PREFIX: &str = "input/";
const OUTPUT_PREFIX: &str = "output/";
const OUTPUT_FILE_PREFIX: &str = "processed_";

/// `input/<file name>`, spaces replaced by underscores.
pub fn input_key(file_name: &str) -> String {
    format!("{}{}", INPUT_PREFIX, file_name.replace(' ', "_"))
}

/// `output/processed_<base name of the input key>`.
pub fn output_key(input_key: &str) -> String {
    let base_name = input_key.rsplit('/').next().unwrap_or(input_key);
    format!("{}{}{}", OUTPUT_PREFIX, OUTPUT_FILE_PREFIX, base_name)
}
