//! Placeholder payloads: small-file boilerplate and large-blob headers.
//!
//! Content is semantically irrelevant to the consumers under test; it only
//! has to look like the file type its extension claims and hit an exact size.

use crate::plan::budget::{BlobAssignment, BlobKind, CsvBlob};
use crate::plan::small_files::SmallFileKind;

/// Boilerplate for one small file, padded or truncated to exactly `size` bytes.
#[must_use]
pub fn small_file_body(kind: SmallFileKind, index: u32, size: u64) -> Vec<u8> {
    let (head, filler) = match kind {
        SmallFileKind::Script => (
            format!(
                "#!/usr/bin/env python3\n\
                 \"\"\"Maintenance script {index:03}: collect interface counters.\"\"\"\n\n\
                 import json\n\n\
                 def run(devices):\n    \
                 return {{d[\"name\"]: d.get(\"status\", \"unknown\") for d in devices}}\n\n"
            ),
            "# padding: this line intentionally left as filler\n",
        ),
        SmallFileKind::Report => (
            format!(
                "Compliance report {index:03}\n\
                 ==========================\n\
                 scope: all sites\nresult: PASS\n\n"
            ),
            "device=placeholder check=ntp-sync status=ok\n",
        ),
        SmallFileKind::Template => (
            format!(
                "{{# template {index:03}: interface stanza #}}\n\
                 {{% for intf in interfaces %}}\n\
                 interface {{{{ intf.name }}}}\n \
                 description {{{{ intf.description }}}}\n\
                 {{% endfor %}}\n"
            ),
            "{# filler #}\n",
        ),
        SmallFileKind::Config => (
            format!(
                "! config snippet {index:03}\n\
                 hostname edge-{index:03}\n\
                 ntp server 192.0.2.1\n\
                 logging host 192.0.2.10\n"
            ),
            "! filler\n",
        ),
    };
    fit_to_size(head.into_bytes(), filler.as_bytes(), size)
}

/// Leading bytes of a large blob. The rest of the file is zero fill.
#[must_use]
pub fn blob_header(blob: &BlobAssignment) -> Vec<u8> {
    match blob.kind {
        BlobKind::Csv { table } => {
            let columns = match table {
                CsvBlob::Devices => "id,name,site,role,platform,serial,status",
                CsvBlob::Links => "id,a_device,a_interface,b_device,b_interface,speed",
                CsvBlob::Sites => "id,name,region,latitude,longitude,status",
            };
            format!("{columns}\n").into_bytes()
        }
        BlobKind::Json { index } => format!(
            "{{\"source\":\"netrepo_synth\",\"chunk\":{index},\"size_mb\":{},\"records\":[",
            blob.size_mb
        )
        .into_bytes(),
    }
}

/// Repeat `filler` after `head` until `size` bytes, then cut to exactly `size`.
fn fit_to_size(mut body: Vec<u8>, filler: &[u8], size: u64) -> Vec<u8> {
    let target = usize::try_from(size).unwrap_or(usize::MAX);
    while body.len() < target && !filler.is_empty() {
        body.extend_from_slice(filler);
    }
    body.truncate(target);
    body
}
