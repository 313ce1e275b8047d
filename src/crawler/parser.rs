//! HTML parser for division tables
//!
//! Every level of the hierarchy is published as a table whose rows carry a
//! level-specific class (`citytr`, `countytr`, ...). A row either links to the
//! next level (code and name as two anchors) or is terminal (plain cells).
//! Village rows are always plain cells: code, classification, name.
//!
//! Parsing is synchronous and returns owned data so that no `scraper::Html`
//! value is ever held across an await point.

use crate::division::Level;
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A province link from the index page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceLink {
    /// Two-digit code taken from the link target (`11.html` → `11`)
    pub code: String,
    pub name: String,
    /// Absolute URL of the province's city table
    pub url: Url,
}

/// One row of a division table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// Code truncated to the level's width (villages keep all 12 digits)
    pub code: String,
    pub name: String,
    /// Absolute URL of the next level's table; `None` for terminal rows
    pub link: Option<Url>,
    /// Urban/rural classification, village rows only
    pub region_type: Option<String>,
}

/// Rows of one table plus the rows that could not be read
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub rows: Vec<TableRow>,
    pub errors: Vec<ParseError>,
}

impl ParsedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.errors.is_empty()
    }
}

/// Extracts the province links from the index page
///
/// # Arguments
///
/// * `html` - Body of the index page
/// * `base_url` - URL of the index page, for resolving relative links
///
/// # Example
///
/// ```
/// use division_crawler::crawler::parse_provinces;
/// use url::Url;
///
/// let html = r#"<table><tr class="provincetr"><td><a href="11.html">北京市<br/></a></td></tr></table>"#;
/// let base = Url::parse("http://www.stats.gov.cn/2021/index.html").unwrap();
/// let parsed = parse_provinces(html, &base).unwrap();
/// assert_eq!(parsed.0[0].code, "11");
/// assert_eq!(parsed.0[0].url.as_str(), "http://www.stats.gov.cn/2021/11.html");
/// ```
pub fn parse_provinces(
    html: &str,
    base_url: &Url,
) -> Result<(Vec<ProvinceLink>, Vec<ParseError>), ParseError> {
    let document = Html::parse_document(html);
    let anchors = selector("tr.provincetr a")?;
    let marker = Level::Province.row_marker();

    let mut links = Vec::new();
    let mut errors = Vec::new();

    for anchor in document.select(&anchors) {
        let href = anchor.value().attr("href").unwrap_or("").trim();
        let name = element_text(&anchor);

        // The link target is "<code>.html"
        let stem = href
            .rsplit('/')
            .next()
            .and_then(|file| file.split('.').next())
            .unwrap_or("");

        if !is_numeric_code(stem, Level::Province.code_width()) {
            errors.push(ParseError::BadCode {
                marker,
                code: href.to_string(),
                width: Level::Province.code_width(),
            });
            continue;
        }

        match resolve_link(href, base_url, marker) {
            Ok(url) => links.push(ProvinceLink {
                code: stem[..Level::Province.code_width()].to_string(),
                name,
                url,
            }),
            Err(e) => errors.push(e),
        }
    }

    Ok((links, errors))
}

/// Extracts the rows of one level's table
///
/// Only a bad selector fails the whole call; a malformed row is reported in
/// `ParsedTable::errors` and its siblings are still returned.
pub fn parse_table(html: &str, base_url: &Url, level: Level) -> Result<ParsedTable, ParseError> {
    let document = Html::parse_document(html);
    let rows = selector(&format!("tr.{}", level.row_marker()))?;
    let anchors = selector("a")?;
    let cells = selector("td")?;

    let mut table = ParsedTable::default();

    for row in document.select(&rows) {
        let parsed = if level == Level::Village {
            parse_village_row(&row, &cells)
        } else {
            parse_linked_row(&row, &anchors, &cells, base_url, level)
        };

        match parsed {
            Ok(row) => table.rows.push(row),
            Err(e) => table.errors.push(e),
        }
    }

    Ok(table)
}

/// Reads a city/county/town row
///
/// `<tr class='citytr'><td><a href='65/6501.html'>650100000000</a></td><td><a href='65/6501.html'>乌鲁木齐市</a></td></tr>`
fn parse_linked_row(
    row: &ElementRef,
    anchors: &Selector,
    cells: &Selector,
    base_url: &Url,
    level: Level,
) -> Result<TableRow, ParseError> {
    let marker = level.row_marker();
    let links: Vec<ElementRef> = row.select(anchors).collect();
    let tds: Vec<ElementRef> = row.select(cells).collect();

    if let Some(code_link) = links.first() {
        let name = match links.get(1).or_else(|| tds.get(1)) {
            Some(element) => element_text(element),
            None => {
                return Err(ParseError::MissingCells {
                    marker,
                    found: tds.len(),
                    expected: 2,
                })
            }
        };
        let code = truncate_code(&element_text(code_link), level)?;
        let href = code_link.value().attr("href").unwrap_or("").trim();
        let link = resolve_link(href, base_url, marker)?;

        return Ok(TableRow {
            code,
            name,
            link: Some(link),
            region_type: None,
        });
    }

    // Terminal row: two plain cells
    if tds.len() < 2 {
        return Err(ParseError::MissingCells {
            marker,
            found: tds.len(),
            expected: 2,
        });
    }

    Ok(TableRow {
        code: truncate_code(&element_text(&tds[0]), level)?,
        name: element_text(&tds[1]),
        link: None,
        region_type: None,
    })
}

/// Reads a village row
///
/// `<tr class='villagetr'><td>420222104001</td><td>121</td><td>太子街社区委员会</td></tr>`
fn parse_village_row(row: &ElementRef, cells: &Selector) -> Result<TableRow, ParseError> {
    let marker = Level::Village.row_marker();
    let tds: Vec<ElementRef> = row.select(cells).collect();

    if tds.len() < 3 {
        return Err(ParseError::MissingCells {
            marker,
            found: tds.len(),
            expected: 3,
        });
    }

    let code = element_text(&tds[0]);
    if !is_numeric_code(&code, Level::Village.code_width()) {
        return Err(ParseError::BadCode {
            marker,
            code,
            width: Level::Village.code_width(),
        });
    }

    Ok(TableRow {
        code,
        name: element_text(&tds[2]),
        link: None,
        region_type: Some(element_text(&tds[1])),
    })
}

/// Keeps the significant digits of a 12-digit display code
///
/// `650100000000` at city level becomes `6501`.
pub fn truncate_code(raw: &str, level: Level) -> Result<String, ParseError> {
    let width = level.code_width();
    let raw = raw.trim();

    if !is_numeric_code(raw, width) {
        return Err(ParseError::BadCode {
            marker: level.row_marker(),
            code: raw.to_string(),
            width,
        });
    }

    Ok(raw[..width].to_string())
}

fn is_numeric_code(code: &str, width: usize) -> bool {
    code.len() >= width && code.bytes().all(|b| b.is_ascii_digit())
}

/// Resolves a link href against the page it appeared on
fn resolve_link(href: &str, base_url: &Url, marker: &'static str) -> Result<Url, ParseError> {
    if href.is_empty() {
        return Err(ParseError::BadLink {
            marker,
            href: href.to_string(),
            reason: "empty href".to_string(),
        });
    }

    base_url.join(href).map_err(|e| ParseError::BadLink {
        marker,
        href: href.to_string(),
        reason: e.to_string(),
    })
}

fn element_text(element: &ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_url() -> Url {
        Url::parse("http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/2021/65.html").unwrap()
    }

    fn table(rows: &str) -> String {
        format!("<html><body><table>{}</table></body></html>", rows)
    }

    #[test]
    fn test_city_row_with_links() {
        let html = table(
            "<tr class='citytr'><td><a href='65/6501.html'>650100000000</a></td>\
             <td><a href='65/6501.html'>乌鲁木齐市</a></td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::City).unwrap();

        assert!(parsed.errors.is_empty());
        assert_eq!(parsed.rows.len(), 1);
        let row = &parsed.rows[0];
        assert_eq!(row.code, "6501");
        assert_eq!(row.name, "乌鲁木齐市");
        assert_eq!(
            row.link.as_ref().unwrap().as_str(),
            "http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/2021/65/6501.html"
        );
        assert_eq!(row.region_type, None);
    }

    #[test]
    fn test_name_falls_back_to_second_cell() {
        let html = table(
            "<tr class='countytr'><td><a href='01/650102.html'>650102000000</a></td>\
             <td>天山区</td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::County).unwrap();

        assert_eq!(parsed.rows[0].code, "650102");
        assert_eq!(parsed.rows[0].name, "天山区");
        assert!(parsed.rows[0].link.is_some());
    }

    #[test]
    fn test_terminal_row_has_no_link() {
        let html = table("<tr class='countytr'><td>650101000000</td><td>市辖区</td></tr>");
        let parsed = parse_table(&html, &base_url(), Level::County).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].code, "650101");
        assert_eq!(parsed.rows[0].name, "市辖区");
        assert_eq!(parsed.rows[0].link, None);
    }

    #[test]
    fn test_town_row_truncated_to_nine_digits() {
        let html = table(
            "<tr class='towntr'><td><a href='07/110107001.html'>110107001000</a></td>\
             <td><a href='07/110107001.html'>八宝山街道办事处</a></td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::Town).unwrap();
        assert_eq!(parsed.rows[0].code, "110107001");
        assert_eq!(parsed.rows[0].name, "八宝山街道办事处");
    }

    #[test]
    fn test_village_row() {
        let html = table(
            "<tr class='villagetr'><td>420222104001</td><td>121</td><td>太子街社区委员会</td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::Village).unwrap();

        let row = &parsed.rows[0];
        assert_eq!(row.code, "420222104001");
        assert_eq!(row.region_type.as_deref(), Some("121"));
        assert_eq!(row.name, "太子街社区委员会");
        assert_eq!(row.link, None);
    }

    #[test]
    fn test_only_rows_of_requested_level() {
        let html = table(
            "<tr class='countyhead'><td>统计用区划代码</td><td>名称</td></tr>\
             <tr class='countytr'><td>650101000000</td><td>市辖区</td></tr>\
             <tr class='towntr'><td>650101001000</td><td>某街道</td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::County).unwrap();
        assert_eq!(parsed.rows.len(), 1);
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn test_no_matching_rows_is_empty() {
        let html = table("<tr class='towntr'><td>650101001000</td><td>某街道</td></tr>");
        let parsed = parse_table(&html, &base_url(), Level::County).unwrap();
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_missing_cells_reported_not_panicking() {
        let html = table(
            "<tr class='towntr'><td>650101001000</td></tr>\
             <tr class='towntr'><td>650101002000</td><td>好街道</td></tr>",
        );
        let parsed = parse_table(&html, &base_url(), Level::Town).unwrap();

        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0].code, "650101002");
        assert_eq!(
            parsed.errors,
            vec![ParseError::MissingCells {
                marker: "towntr",
                found: 1,
                expected: 2
            }]
        );
    }

    #[test]
    fn test_short_village_row_reported() {
        let html = table("<tr class='villagetr'><td>420222104001</td><td>121</td></tr>");
        let parsed = parse_table(&html, &base_url(), Level::Village).unwrap();
        assert!(parsed.rows.is_empty());
        assert_eq!(parsed.errors.len(), 1);
    }

    #[test]
    fn test_link_without_name_reported() {
        let html = table("<tr class='citytr'><td><a href='65/6501.html'>650100000000</a></td></tr>");
        let parsed = parse_table(&html, &base_url(), Level::City).unwrap();
        assert!(matches!(
            parsed.errors[0],
            ParseError::MissingCells { marker: "citytr", .. }
        ));
    }

    #[test]
    fn test_truncate_code() {
        assert_eq!(truncate_code("650100000000", Level::City).unwrap(), "6501");
        assert_eq!(truncate_code(" 650102000000 ", Level::County).unwrap(), "650102");
        assert!(truncate_code("65", Level::City).is_err());
        assert!(truncate_code("65a100000000", Level::City).is_err());
        assert!(truncate_code("", Level::Town).is_err());
    }

    #[test]
    fn test_parse_provinces() {
        let html = table(
            "<tr class='provincetr'>\
             <td><a href='11.html'>北京市<br/></a></td>\
             <td><a href='65.html'>新疆维吾尔自治区<br/></a></td>\
             <td></td></tr>",
        );
        let base = Url::parse("http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/2021/index.html")
            .unwrap();
        let (links, errors) = parse_provinces(&html, &base).unwrap();

        assert!(errors.is_empty());
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].code, "11");
        assert_eq!(links[0].name, "北京市");
        assert_eq!(
            links[1].url.as_str(),
            "http://www.stats.gov.cn/tjsj/tjbz/tjyqhdmhcxhfdm/2021/65.html"
        );
    }

    #[test]
    fn test_province_with_bad_href_reported() {
        let html = table("<tr class='provincetr'><td><a href='about.html'>关于</a></td></tr>");
        let (links, errors) = parse_provinces(&html, &base_url()).unwrap();
        assert!(links.is_empty());
        assert_eq!(errors.len(), 1);
    }
}
