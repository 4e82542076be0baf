use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use clap::Parser;
use peprops::{PeProperties, properties_from_nt_headers};
use peprops::headers::DirectoryId;
use serde_json::json;
use tracing::debug;
use tracing_subscriber::EnvFilter;


const MZ_SIGNATURE: &[u8] = b"MZ";
const NT_HEADERS_OFFSET_LOCATION: usize = 0x3C;


#[derive(Parser)]
enum ProgMode {
    Header(InputFileOnlyArgs),
    Strip(StripArgs),
    VaToRva(VaToRvaArgs),
    RvaToVa(RvaToVaArgs),
}

#[derive(Parser)]
struct InputFileOnlyArgs {
    pub input_file: PathBuf,
}

#[derive(Parser)]
struct StripArgs {
    pub input_file: PathBuf,

    /// Never strip below this many directory entries.
    #[arg(long, default_value_t = 1)]
    pub min_count: u32,

    /// Keep a trailing import address table directory even if it is the last one in use.
    #[arg(long)]
    pub keep_iat: bool,
}

#[derive(Parser)]
struct VaToRvaArgs {
    pub input_file: PathBuf,

    #[arg(value_parser = parse_u64)]
    pub va: u64,

    /// Wrap around instead of failing for addresses outside the image's 4 GiB window.
    #[arg(long)]
    pub unchecked: bool,
}

#[derive(Parser)]
struct RvaToVaArgs {
    pub input_file: PathBuf,

    #[arg(value_parser = parse_u32)]
    pub rva: u32,
}


fn strip_radix_prefix(s: &str) -> (&str, u32) {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (hex, 16)
    } else {
        (s, 10)
    }
}

fn parse_u64(s: &str) -> Result<u64, ParseIntError> {
    let (digits, radix) = strip_radix_prefix(s);
    u64::from_str_radix(digits, radix)
}

fn parse_u32(s: &str) -> Result<u32, ParseIntError> {
    let (digits, radix) = strip_radix_prefix(s);
    u32::from_str_radix(digits, radix)
}


fn load_properties(path: &Path) -> Box<dyn PeProperties> {
    let input_bytes = std::fs::read(path)
        .expect("failed to read input file");

    if !input_bytes.starts_with(MZ_SIGNATURE) || input_bytes.len() < NT_HEADERS_OFFSET_LOCATION + 4 {
        panic!("input file is not an MZ executable");
    }
    let nt_offset_bytes: [u8; 4] = input_bytes[NT_HEADERS_OFFSET_LOCATION..NT_HEADERS_OFFSET_LOCATION+4]
        .try_into().unwrap();
    let nt_offset = usize::try_from(u32::from_le_bytes(nt_offset_bytes)).unwrap();
    debug!("NT headers at {:#X}", nt_offset);

    let nt_bytes = input_bytes.get(nt_offset..)
        .expect("NT header offset points beyond the end of the file");
    properties_from_nt_headers(nt_bytes)
        .expect("failed to read NT headers")
}

fn directories_json(props: &dyn PeProperties) -> serde_json::Value {
    let mut directories = Vec::new();
    for index in 0..props.number_of_rvas_and_sizes() {
        let name = DirectoryId::from_index(index)
            .map(|id| id.to_string());
        directories.push(json!({
            "index": index,
            "name": name,
            "rva": props.directory_rva(index).expect("declared directory missing"),
            "size": props.directory_size(index).expect("declared directory missing"),
        }));
    }
    serde_json::Value::Array(directories)
}

fn header_json(props: &dyn PeProperties) -> serde_json::Value {
    json!({
        "pe_type": props.pe_type(),
        "signature": props.pe_signature(),
        "magic": props.magic(),
        "machine": props.machine(),
        "number_of_sections": props.number_of_sections(),
        "time_date_stamp": props.time_date_stamp(),
        "size_of_optional_header": props.size_of_optional_header(),
        "characteristics": props.characteristics(),
        "entry_point": props.entry_point(),
        "base_of_code": props.base_of_code(),
        "image_base": props.image_base_64(),
        "section_alignment": props.section_alignment(),
        "file_alignment": props.file_alignment(),
        "os_version": [props.major_os_version(), props.minor_os_version()],
        "subsystem_version": [props.major_subsystem_version(), props.minor_subsystem_version()],
        "size_of_image": props.size_of_image(),
        "size_of_headers": props.size_of_headers(),
        "checksum": props.checksum(),
        "subsystem": props.subsystem(),
        "dll_characteristics": props.dll_characteristics(),
        "stack_size_reserve": props.stack_size_reserve_64(),
        "stack_size_commit": props.stack_size_commit_64(),
        "heap_size_reserve": props.heap_size_reserve_64(),
        "heap_size_commit": props.heap_size_commit_64(),
        "number_of_rvas_and_sizes": props.number_of_rvas_and_sizes(),
        "directories": directories_json(props),
    })
}


fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mode = ProgMode::parse();
    match mode {
        ProgMode::Header(args) => {
            let props = load_properties(&args.input_file);
            let output = serde_json::to_string_pretty(&header_json(props.as_ref()))
                .expect("failed to serialize header");
            println!("{}", output);
        },
        ProgMode::Strip(args) => {
            let mut props = load_properties(&args.input_file);
            let old_count = props.number_of_rvas_and_sizes();
            let new_count = props.strip_data_directories(args.min_count, !args.keep_iat);
            let output = json!({
                "old_count": old_count,
                "new_count": new_count,
                "nt_headers_size": props.nt_headers_bytes().len(),
                "directories": directories_json(props.as_ref()),
            });
            println!("{}", serde_json::to_string_pretty(&output).expect("failed to serialize result"));
        },
        ProgMode::VaToRva(args) => {
            let props = load_properties(&args.input_file);
            let rva = props.va_to_rva(args.va, !args.unchecked)
                .expect("failed to convert VA to RVA");
            println!("{:#X}", rva);
        },
        ProgMode::RvaToVa(args) => {
            let props = load_properties(&args.input_file);
            let va = props.rva_to_va_64(args.rva);
            println!("{:#X}", va);
        },
    }
}
