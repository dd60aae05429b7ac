//! Structural metadata (`mets.xml`).

use crate::error::PackageError;
use crate::hash::HashAlgorithm;

use super::dublin_core::{self, DcElement, DCTERMS_NAMESPACE, DC_NAMESPACE};
use super::info::PackageFile;
use super::xml::XmlOut;

const METS_NAMESPACE: &str = "http://www.loc.gov/METS/";
const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";
const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";
const METS_SCHEMA_LOCATION: &str =
    "http://www.loc.gov/METS/ http://www.loc.gov/standards/mets/mets.xsd";

pub struct MetsDocument<'a> {
    /// RFC 3339 creation timestamp.
    pub created: &'a str,
    pub agent: &'a str,
    pub label: &'a str,
    pub elements: &'a [DcElement],
    pub files: &'a [PackageFile],
    pub algorithm: HashAlgorithm,
}

impl MetsDocument<'_> {
    pub fn render(&self) -> Result<String, PackageError> {
        let mut out = XmlOut::new("mets.xml");
        out.declaration()?;
        out.start(
            "mets:mets",
            &[
                ("xmlns:mets", METS_NAMESPACE),
                ("xmlns:xlink", XLINK_NAMESPACE),
                ("xmlns:dc", DC_NAMESPACE),
                ("xmlns:dcterms", DCTERMS_NAMESPACE),
                ("xmlns:xsi", XSI_NAMESPACE),
                ("xsi:schemaLocation", METS_SCHEMA_LOCATION),
            ],
        )?;

        out.start("mets:metsHdr", &[("CREATEDATE", self.created)])?;
        out.start(
            "mets:agent",
            &[
                ("ROLE", "CREATOR"),
                ("TYPE", "OTHER"),
                ("OTHERTYPE", "SOFTWARE"),
            ],
        )?;
        out.text_element("mets:name", &[], self.agent)?;
        out.end("mets:agent")?;
        out.end("mets:metsHdr")?;

        out.start("mets:dmdSec", &[("ID", "dmdSec_1")])?;
        out.start("mets:mdWrap", &[("MDTYPE", "DC")])?;
        out.start("mets:xmlData", &[])?;
        dublin_core::write_elements(&mut out, self.elements)?;
        out.end("mets:xmlData")?;
        out.end("mets:mdWrap")?;
        out.end("mets:dmdSec")?;

        let checksum_type = self.algorithm.mets_name();
        out.start("mets:fileSec", &[])?;
        out.start("mets:fileGrp", &[("USE", "original")])?;
        for (index, file) in self.files.iter().enumerate() {
            let id = file_id(index);
            let size = file.size.to_string();
            out.start(
                "mets:file",
                &[
                    ("ID", id.as_str()),
                    ("MIMETYPE", file.mime_type.as_str()),
                    ("SIZE", size.as_str()),
                    ("CHECKSUMTYPE", checksum_type),
                    ("CHECKSUM", file.checksum.as_str()),
                ],
            )?;
            out.empty(
                "mets:FLocat",
                &[
                    ("LOCTYPE", "OTHER"),
                    ("OTHERLOCTYPE", "SYSTEM"),
                    ("xlink:href", file.relative_path.as_str()),
                ],
            )?;
            out.end("mets:file")?;
        }
        out.end("mets:fileGrp")?;
        out.end("mets:fileSec")?;

        out.start("mets:structMap", &[("TYPE", "physical")])?;
        out.start(
            "mets:div",
            &[("TYPE", "Item"), ("LABEL", self.label), ("DMDID", "dmdSec_1")],
        )?;
        for index in 0..self.files.len() {
            let id = file_id(index);
            out.empty("mets:fptr", &[("FILEID", id.as_str())])?;
        }
        out.end("mets:div")?;
        out.end("mets:structMap")?;

        out.end("mets:mets")?;
        Ok(out.finish())
    }
}

fn file_id(index: usize) -> String {
    format!("file_{}", index + 1)
}
