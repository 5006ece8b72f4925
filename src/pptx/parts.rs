use anyhow::{Context, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::model::TextFragment;

use super::layout::{SLIDE_HEIGHT_EMU, SLIDE_WIDTH_EMU, TextBoxPlacement};

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_PKG_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const NS_CONTENT_TYPES: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
const REL_CORE: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
const REL_EXTENDED: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties";
const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
const REL_THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
const REL_PRES_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/presProps";
const REL_VIEW_PROPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/viewProps";
const REL_TABLE_STYLES: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/tableStyles";
const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

const CT_PRESENTATION: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation.main+xml";
const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";
const CT_SLIDE_MASTER: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideMaster+xml";
const CT_SLIDE_LAYOUT: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.slideLayout+xml";
const CT_THEME: &str = "application/vnd.openxmlformats-officedocument.theme+xml";
const CT_PRES_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presProps+xml";
const CT_VIEW_PROPS: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.viewProps+xml";
const CT_TABLE_STYLES: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.tableStyles+xml";
const CT_CORE: &str = "application/vnd.openxmlformats-package.core-properties+xml";
const CT_EXTENDED: &str = "application/vnd.openxmlformats-officedocument.extended-properties+xml";
const CT_RELS: &str = "application/vnd.openxmlformats-package.relationships+xml";

/// First slide id; PowerPoint requires ids >= 256.
const FIRST_SLIDE_ID: usize = 256;
const MASTER_ID: &str = "2147483648";

type XmlWriter = Writer<Vec<u8>>;

fn document(build: impl FnOnce(&mut XmlWriter) -> Result<()>) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .with_context(|| "failed to write xml declaration")?;
    build(&mut writer)?;
    Ok(writer.into_inner())
}

fn start(writer: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
    writer.write_event(Event::Start(element))?;
    Ok(())
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn empty(writer: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let element = BytesStart::new(name).with_attributes(attrs.iter().copied());
    writer.write_event(Event::Empty(element))?;
    Ok(())
}

fn text(writer: &mut XmlWriter, value: &str) -> Result<()> {
    writer.write_event(Event::Text(BytesText::new(value)))?;
    Ok(())
}

fn text_element(writer: &mut XmlWriter, name: &str, attrs: &[(&str, &str)], value: &str) -> Result<()> {
    start(writer, name, attrs)?;
    text(writer, value)?;
    end(writer, name)
}

pub(crate) struct Relationship<'a> {
    pub(crate) id: String,
    pub(crate) kind: &'a str,
    pub(crate) target: String,
}

pub(crate) fn relationships(rels: &[Relationship<'_>]) -> Result<Vec<u8>> {
    document(|w| {
        start(w, "Relationships", &[("xmlns", NS_PKG_RELS)])?;
        for rel in rels {
            empty(
                w,
                "Relationship",
                &[("Id", rel.id.as_str()), ("Type", rel.kind), ("Target", rel.target.as_str())],
            )?;
        }
        end(w, "Relationships")
    })
}

pub(crate) fn root_relationships() -> Result<Vec<u8>> {
    relationships(&[
        Relationship {
            id: "rId1".to_string(),
            kind: REL_OFFICE_DOCUMENT,
            target: "ppt/presentation.xml".to_string(),
        },
        Relationship {
            id: "rId2".to_string(),
            kind: REL_CORE,
            target: "docProps/core.xml".to_string(),
        },
        Relationship {
            id: "rId3".to_string(),
            kind: REL_EXTENDED,
            target: "docProps/app.xml".to_string(),
        },
    ])
}

/// `media` lists (extension, mime) pairs for every image format used.
pub(crate) fn content_types(slide_count: usize, media: &[(&str, &str)]) -> Result<Vec<u8>> {
    document(|w| {
        start(w, "Types", &[("xmlns", NS_CONTENT_TYPES)])?;
        empty(w, "Default", &[("Extension", "rels"), ("ContentType", CT_RELS)])?;
        empty(w, "Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
        for &(extension, mime) in media {
            empty(w, "Default", &[("Extension", extension), ("ContentType", mime)])?;
        }
        let overrides = [
            ("/ppt/presentation.xml", CT_PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml", CT_SLIDE_MASTER),
            ("/ppt/slideLayouts/slideLayout1.xml", CT_SLIDE_LAYOUT),
            ("/ppt/theme/theme1.xml", CT_THEME),
            ("/ppt/presProps.xml", CT_PRES_PROPS),
            ("/ppt/viewProps.xml", CT_VIEW_PROPS),
            ("/ppt/tableStyles.xml", CT_TABLE_STYLES),
            ("/docProps/core.xml", CT_CORE),
            ("/docProps/app.xml", CT_EXTENDED),
        ];
        for (part, content_type) in overrides {
            empty(w, "Override", &[("PartName", part), ("ContentType", content_type)])?;
        }
        for number in 1..=slide_count {
            let part = format!("/ppt/slides/slide{}.xml", number);
            empty(w, "Override", &[("PartName", part.as_str()), ("ContentType", CT_SLIDE)])?;
        }
        end(w, "Types")
    })
}

pub(crate) fn presentation(slide_count: usize) -> Result<Vec<u8>> {
    let slide_width = SLIDE_WIDTH_EMU.to_string();
    let slide_height = SLIDE_HEIGHT_EMU.to_string();
    document(|w| {
        start(
            w,
            "p:presentation",
            &[
                ("xmlns:a", NS_A),
                ("xmlns:r", NS_R),
                ("xmlns:p", NS_P),
                ("saveSubsetFonts", "1"),
            ],
        )?;
        start(w, "p:sldMasterIdLst", &[])?;
        empty(w, "p:sldMasterId", &[("id", MASTER_ID), ("r:id", "rId1")])?;
        end(w, "p:sldMasterIdLst")?;
        if slide_count > 0 {
            start(w, "p:sldIdLst", &[])?;
            for idx in 0..slide_count {
                let id = (FIRST_SLIDE_ID + idx).to_string();
                let rel = format!("rId{}", idx + 2);
                empty(w, "p:sldId", &[("id", id.as_str()), ("r:id", rel.as_str())])?;
            }
            end(w, "p:sldIdLst")?;
        }
        empty(w, "p:sldSz", &[("cx", slide_width.as_str()), ("cy", slide_height.as_str())])?;
        empty(w, "p:notesSz", &[("cx", "6858000"), ("cy", "9144000")])?;
        end(w, "p:presentation")
    })
}

pub(crate) fn presentation_relationships(slide_count: usize) -> Result<Vec<u8>> {
    let mut rels = vec![Relationship {
        id: "rId1".to_string(),
        kind: REL_SLIDE_MASTER,
        target: "slideMasters/slideMaster1.xml".to_string(),
    }];
    for number in 1..=slide_count {
        rels.push(Relationship {
            id: format!("rId{}", number + 1),
            kind: REL_SLIDE,
            target: format!("slides/slide{}.xml", number),
        });
    }
    let next = slide_count + 2;
    for (offset, (kind, target)) in [
        (REL_THEME, "theme/theme1.xml"),
        (REL_PRES_PROPS, "presProps.xml"),
        (REL_VIEW_PROPS, "viewProps.xml"),
        (REL_TABLE_STYLES, "tableStyles.xml"),
    ]
    .into_iter()
    .enumerate()
    {
        rels.push(Relationship {
            id: format!("rId{}", next + offset),
            kind,
            target: target.to_string(),
        });
    }
    relationships(&rels)
}

pub(crate) fn slide_relationships(media_target: &str) -> Result<Vec<u8>> {
    relationships(&[
        Relationship {
            id: "rId1".to_string(),
            kind: REL_SLIDE_LAYOUT,
            target: "../slideLayouts/slideLayout1.xml".to_string(),
        },
        Relationship {
            id: "rId2".to_string(),
            kind: REL_IMAGE,
            target: format!("../media/{}", media_target),
        },
    ])
}

pub(crate) fn master_relationships() -> Result<Vec<u8>> {
    relationships(&[
        Relationship {
            id: "rId1".to_string(),
            kind: REL_SLIDE_LAYOUT,
            target: "../slideLayouts/slideLayout1.xml".to_string(),
        },
        Relationship {
            id: "rId2".to_string(),
            kind: REL_THEME,
            target: "../theme/theme1.xml".to_string(),
        },
    ])
}

pub(crate) fn layout_relationships() -> Result<Vec<u8>> {
    relationships(&[Relationship {
        id: "rId1".to_string(),
        kind: REL_SLIDE_MASTER,
        target: "../slideMasters/slideMaster1.xml".to_string(),
    }])
}

fn group_shape_header(w: &mut XmlWriter) -> Result<()> {
    start(w, "p:nvGrpSpPr", &[])?;
    empty(w, "p:cNvPr", &[("id", "1"), ("name", "")])?;
    empty(w, "p:cNvGrpSpPr", &[])?;
    empty(w, "p:nvPr", &[])?;
    end(w, "p:nvGrpSpPr")?;
    start(w, "p:grpSpPr", &[])?;
    start(w, "a:xfrm", &[])?;
    empty(w, "a:off", &[("x", "0"), ("y", "0")])?;
    empty(w, "a:ext", &[("cx", "0"), ("cy", "0")])?;
    empty(w, "a:chOff", &[("x", "0"), ("y", "0")])?;
    empty(w, "a:chExt", &[("cx", "0"), ("cy", "0")])?;
    end(w, "a:xfrm")?;
    end(w, "p:grpSpPr")
}

fn transform(w: &mut XmlWriter, left: i64, top: i64, width: i64, height: i64) -> Result<()> {
    let (x, y) = (left.to_string(), top.to_string());
    let (cx, cy) = (width.to_string(), height.to_string());
    start(w, "a:xfrm", &[])?;
    empty(w, "a:off", &[("x", x.as_str()), ("y", y.as_str())])?;
    empty(w, "a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])?;
    end(w, "a:xfrm")?;
    start(w, "a:prstGeom", &[("prst", "rect")])?;
    empty(w, "a:avLst", &[])?;
    end(w, "a:prstGeom")
}

fn background_picture(w: &mut XmlWriter) -> Result<()> {
    start(w, "p:pic", &[])?;
    start(w, "p:nvPicPr", &[])?;
    empty(w, "p:cNvPr", &[("id", "2"), ("name", "Background")])?;
    start(w, "p:cNvPicPr", &[])?;
    empty(w, "a:picLocks", &[("noChangeAspect", "1")])?;
    end(w, "p:cNvPicPr")?;
    empty(w, "p:nvPr", &[])?;
    end(w, "p:nvPicPr")?;
    start(w, "p:blipFill", &[])?;
    empty(w, "a:blip", &[("r:embed", "rId2")])?;
    start(w, "a:stretch", &[])?;
    empty(w, "a:fillRect", &[])?;
    end(w, "a:stretch")?;
    end(w, "p:blipFill")?;
    start(w, "p:spPr", &[])?;
    transform(w, 0, 0, SLIDE_WIDTH_EMU, SLIDE_HEIGHT_EMU)?;
    end(w, "p:spPr")?;
    end(w, "p:pic")
}

fn text_box(
    w: &mut XmlWriter,
    shape_id: usize,
    fragment: &TextFragment,
    placement: &TextBoxPlacement,
) -> Result<()> {
    let style = fragment.style();
    let family = style.category.family();
    let id = shape_id.to_string();
    let name = format!("TextBox {}", shape_id - 2);
    let size = (placement.font_size_pt * 100).to_string();
    let bold = if style.is_bold() { "1" } else { "0" };
    let color = style.color.hex();

    start(w, "p:sp", &[])?;
    start(w, "p:nvSpPr", &[])?;
    empty(w, "p:cNvPr", &[("id", id.as_str()), ("name", name.as_str())])?;
    empty(w, "p:cNvSpPr", &[("txBox", "1")])?;
    empty(w, "p:nvPr", &[])?;
    end(w, "p:nvSpPr")?;
    start(w, "p:spPr", &[])?;
    transform(w, placement.left, placement.top, placement.width, placement.height)?;
    empty(w, "a:noFill", &[])?;
    end(w, "p:spPr")?;
    start(w, "p:txBody", &[])?;
    start(
        w,
        "a:bodyPr",
        &[
            ("wrap", "none"),
            ("lIns", "0"),
            ("tIns", "0"),
            ("rIns", "0"),
            ("bIns", "0"),
            ("rtlCol", "0"),
        ],
    )?;
    empty(w, "a:noAutofit", &[])?;
    end(w, "a:bodyPr")?;
    empty(w, "a:lstStyle", &[])?;
    start(w, "a:p", &[])?;
    empty(w, "a:pPr", &[("algn", "l")])?;
    start(w, "a:r", &[])?;
    start(
        w,
        "a:rPr",
        &[
            ("lang", "zh-CN"),
            ("altLang", "en-US"),
            ("sz", size.as_str()),
            ("b", bold),
            ("dirty", "0"),
        ],
    )?;
    start(w, "a:solidFill", &[])?;
    empty(w, "a:srgbClr", &[("val", color.as_str())])?;
    end(w, "a:solidFill")?;
    empty(w, "a:latin", &[("typeface", family)])?;
    empty(w, "a:ea", &[("typeface", family)])?;
    end(w, "a:rPr")?;
    text_element(w, "a:t", &[], fragment.text())?;
    end(w, "a:r")?;
    end(w, "a:p")?;
    end(w, "p:txBody")?;
    end(w, "p:sp")
}

/// One background picture followed by one text box per fragment.
pub(crate) fn slide(texts: &[(&TextFragment, TextBoxPlacement)]) -> Result<Vec<u8>> {
    document(|w| {
        start(w, "p:sld", &[("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)])?;
        start(w, "p:cSld", &[])?;
        start(w, "p:spTree", &[])?;
        group_shape_header(w)?;
        background_picture(w)?;
        for (idx, (fragment, placement)) in texts.iter().enumerate() {
            text_box(w, idx + 3, fragment, placement)?;
        }
        end(w, "p:spTree")?;
        end(w, "p:cSld")?;
        start(w, "p:clrMapOvr", &[])?;
        empty(w, "a:masterClrMapping", &[])?;
        end(w, "p:clrMapOvr")?;
        end(w, "p:sld")
    })
}

pub(crate) fn core_properties(title: &str) -> Result<Vec<u8>> {
    let now = OffsetDateTime::now_utc()
        .replace_nanosecond(0)
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .format(&Rfc3339)
        .with_context(|| "failed to format document timestamp")?;
    document(|w| {
        start(
            w,
            "cp:coreProperties",
            &[
                (
                    "xmlns:cp",
                    "http://schemas.openxmlformats.org/package/2006/metadata/core-properties",
                ),
                ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
                ("xmlns:dcterms", "http://purl.org/dc/terms/"),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ],
        )?;
        text_element(w, "dc:title", &[], title)?;
        text_element(w, "dc:creator", &[], env!("CARGO_PKG_NAME"))?;
        text_element(w, "dcterms:created", &[("xsi:type", "dcterms:W3CDTF")], now.as_str())?;
        text_element(w, "dcterms:modified", &[("xsi:type", "dcterms:W3CDTF")], now.as_str())?;
        end(w, "cp:coreProperties")
    })
}

pub(crate) fn app_properties(slide_count: usize) -> Result<Vec<u8>> {
    let slides = slide_count.to_string();
    document(|w| {
        start(
            w,
            "Properties",
            &[(
                "xmlns",
                "http://schemas.openxmlformats.org/officeDocument/2006/extended-properties",
            )],
        )?;
        text_element(w, "Application", &[], env!("CARGO_PKG_NAME"))?;
        text_element(w, "Slides", &[], slides.as_str())?;
        text_element(w, "PresentationFormat", &[], "Widescreen")?;
        end(w, "Properties")
    })
}

pub(crate) const PRES_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:presentationPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"/>"#;

pub(crate) const VIEW_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:viewPr xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr><p:gridSpacing cx="72008" cy="72008"/></p:viewPr>"#;

pub(crate) const TABLE_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#;

pub(crate) const SLIDE_MASTER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldMaster xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#;

pub(crate) const SLIDE_LAYOUT: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sldLayout xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr></p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#;

pub(crate) const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme"><a:themeElements><a:clrScheme name="Office"><a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1><a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1><a:dk2><a:srgbClr val="44546A"/></a:dk2><a:lt2><a:srgbClr val="E7E6E6"/></a:lt2><a:accent1><a:srgbClr val="4472C4"/></a:accent1><a:accent2><a:srgbClr val="ED7D31"/></a:accent2><a:accent3><a:srgbClr val="A5A5A5"/></a:accent3><a:accent4><a:srgbClr val="FFC000"/></a:accent4><a:accent5><a:srgbClr val="5B9BD5"/></a:accent5><a:accent6><a:srgbClr val="70AD47"/></a:accent6><a:hlink><a:srgbClr val="0563C1"/></a:hlink><a:folHlink><a:srgbClr val="954F72"/></a:folHlink></a:clrScheme><a:fontScheme name="Office"><a:majorFont><a:latin typeface="Noto Sans SC"/><a:ea typeface="Noto Sans SC"/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Noto Serif SC"/><a:ea typeface="Noto Serif SC"/><a:cs typeface=""/></a:minorFont></a:fontScheme><a:fmtScheme name="Office"><a:fillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:fillStyleLst><a:lnStyleLst><a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln><a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln></a:lnStyleLst><a:effectStyleLst><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle><a:effectStyle><a:effectLst/></a:effectStyle></a:effectStyleLst><a:bgFillStyleLst><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:bgFillStyleLst></a:fmtScheme></a:themeElements><a:objectDefaults/><a:extraClrSchemeLst/></a:theme>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBoxPx, FontCategory, Rgb, TextStyle};

    #[test]
    fn slide_has_picture_then_text_boxes() {
        let fragment = TextFragment::new("AI & 教育 <未来>", BBoxPx::new(0, 0, 100, 20), 0.9)
            .with_style(TextStyle {
                category: FontCategory::Script,
                size_pt: 30,
                color: Rgb([255, 0, 16]),
                ..TextStyle::default()
            });
        let placement = TextBoxPlacement {
            left: 1,
            top: 2,
            width: 3,
            height: 4,
            font_size_pt: 28,
        };
        let xml = String::from_utf8(slide(&[(&fragment, placement)]).unwrap()).unwrap();
        assert_eq!(xml.matches("<p:pic>").count(), 1);
        assert_eq!(xml.matches("<p:sp>").count(), 1);
        assert!(xml.find("<p:pic>") < xml.find("<p:sp>"));
        assert!(xml.contains("AI &amp; 教育 &lt;未来&gt;"));
        assert!(xml.contains(r#"sz="2800" b="1""#));
        assert!(xml.contains(r#"<a:srgbClr val="FF0010"/>"#));
        assert!(xml.contains(r#"<a:ea typeface="LXGW WenKai"/>"#));
        assert!(xml.contains(r#"wrap="none""#));
    }

    #[test]
    fn presentation_lists_every_slide() {
        let xml = String::from_utf8(presentation(3).unwrap()).unwrap();
        assert_eq!(xml.matches("<p:sldId ").count(), 3);
        assert!(xml.contains(r#"<p:sldSz cx="12192000" cy="6858000"/>"#));
        let rels = String::from_utf8(presentation_relationships(3).unwrap()).unwrap();
        assert!(rels.contains(r#"Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide3.xml""#));
        assert!(rels.contains(r#"Id="rId5" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme""#));
    }

    #[test]
    fn content_types_cover_media() {
        let xml = String::from_utf8(content_types(2, &[("png", "image/png")]).unwrap()).unwrap();
        assert!(xml.contains(r#"<Default Extension="png" ContentType="image/png"/>"#));
        assert!(xml.contains("/ppt/slides/slide2.xml"));
    }
}
