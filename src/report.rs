//! Report Assembler.
//!
//! `assemble` is a pure function of one customer and one audit result:
//! no I/O, deterministic apart from the embedded generation timestamp, and
//! it never fails, since every result section is guaranteed present by the
//! collector's fallback contract. Template variants are configuration
//! (theme), not code forks.

use crate::models::{AuditResult, Customer, DataSource, TechnicalSeoData};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TECHNICAL_ISSUES_HEADER: &str = "check,status,detail";
pub const KEYWORD_OPPORTUNITIES_HEADER: &str = "keyword,position,search_volume,difficulty";
pub const COMPETITOR_COMPARISON_HEADER: &str =
    "domain,domain_authority,total_backlinks,referring_domains,estimated_traffic,common_keywords";

/// Visual theme for the HTML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportTheme {
    #[default]
    Light,
    Dark,
}

impl ReportTheme {
    fn palette(&self) -> (&'static str, &'static str, &'static str) {
        match self {
            ReportTheme::Light => ("#ffffff", "#1a1a2e", "#2563eb"),
            ReportTheme::Dark => ("#101828", "#f2f4f7", "#60a5fa"),
        }
    }
}

/// A rendered report: one self-contained HTML document plus the CSV export
/// tables, each with a fixed header consumers can rely on for diffing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub customer_id: uuid::Uuid,
    pub slug: String,
    pub generated_at: DateTime<Utc>,
    pub html: String,
    pub technical_issues_csv: String,
    pub keyword_opportunities_csv: String,
    pub competitor_comparison_csv: String,
}

/// Quote a CSV field when it contains a delimiter, quote or newline.
pub fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn check_row(name: &str, passed: bool, detail: &str) -> String {
    format!(
        "{},{},{}\n",
        csv_escape(name),
        if passed { "pass" } else { "fail" },
        csv_escape(detail)
    )
}

/// Recommendations derived from failed technical checks; deterministic for
/// a given result.
fn recommendations(technical: &TechnicalSeoData) -> Vec<&'static str> {
    let mut recs = Vec::new();
    if !technical.https {
        recs.push("Serve the site over HTTPS with a valid certificate.");
    }
    if !technical.mobile_responsive {
        recs.push("Adopt a responsive layout; most search traffic is mobile.");
    }
    if !technical.sitemap {
        recs.push("Publish an XML sitemap and submit it to search consoles.");
    }
    if !technical.robots_txt {
        recs.push("Add a robots.txt to guide crawler access.");
    }
    if !technical.canonical {
        recs.push("Declare canonical URLs to consolidate duplicate content.");
    }
    if !technical.meta_description {
        recs.push("Write unique meta descriptions for key pages.");
    }
    if !technical.schema_markup {
        recs.push("Add structured data markup for rich search results.");
    }
    if !technical.heading_structure {
        recs.push("Use a single H1 and a consistent heading hierarchy.");
    }
    if technical.image_alt_coverage < 0.8 {
        recs.push("Add alt text to images missing it.");
    }
    if recs.is_empty() {
        recs.push("Technical foundation looks solid; focus on content and links.");
    }
    recs
}

#[derive(Debug, Clone, Default)]
pub struct ReportAssembler {
    theme: ReportTheme,
}

impl ReportAssembler {
    pub fn new(theme: ReportTheme) -> Self {
        Self { theme }
    }

    /// Render the full artifact. Pure; the only non-input value embedded is
    /// the generation timestamp.
    pub fn assemble(&self, customer: &Customer, result: &AuditResult) -> ReportArtifact {
        let generated_at = Utc::now();

        ReportArtifact {
            customer_id: customer.id,
            slug: customer.slug.clone(),
            generated_at,
            html: self.render_html(customer, result, generated_at),
            technical_issues_csv: render_technical_issues_csv(result),
            keyword_opportunities_csv: render_keyword_opportunities_csv(result),
            competitor_comparison_csv: render_competitor_comparison_csv(result),
        }
    }

    fn render_html(
        &self,
        customer: &Customer,
        result: &AuditResult,
        generated_at: DateTime<Utc>,
    ) -> String {
        let (bg, fg, accent) = self.theme.palette();
        let perf = &result.performance;
        let tech = &result.technical_seo;
        let links = &result.backlinks;

        let mut sections = String::new();

        sections.push_str(&format!(
            "<section><h2>Performance</h2>{}<ul>\
             <li>Desktop score: {}</li><li>Mobile score: {}</li>\
             <li>LCP: {:.0} ms</li><li>INP: {:.0} ms</li>\
             <li>CLS: {:.2}</li><li>TTFB: {:.0} ms</li></ul></section>\n",
            source_badge(perf.source),
            perf.desktop_score,
            perf.mobile_score,
            perf.core_web_vitals.lcp_ms,
            perf.core_web_vitals.inp_ms,
            perf.core_web_vitals.cls,
            perf.core_web_vitals.ttfb_ms,
        ));

        let checks = [
            ("HTTPS", tech.https),
            ("Mobile responsive", tech.mobile_responsive),
            ("Sitemap", tech.sitemap),
            ("robots.txt", tech.robots_txt),
            ("Canonical URLs", tech.canonical),
            ("Meta description", tech.meta_description),
            ("Schema markup", tech.schema_markup),
            ("Heading structure", tech.heading_structure),
        ];
        let check_items: String = checks
            .iter()
            .map(|(name, ok)| {
                format!(
                    "<li>{} {}</li>",
                    if *ok { "&#10003;" } else { "&#10007;" },
                    name
                )
            })
            .collect();
        sections.push_str(&format!(
            "<section><h2>Technical SEO</h2>{}<ul>{}<li>Image alt coverage: {:.0}%</li></ul></section>\n",
            source_badge(tech.source),
            check_items,
            tech.image_alt_coverage * 100.0,
        ));

        sections.push_str(&format!(
            "<section><h2>Backlinks</h2>{}<ul>\
             <li>Total backlinks: {}</li><li>Referring domains: {}</li>\
             <li>Domain authority: {}</li></ul></section>\n",
            source_badge(links.source),
            links.total_backlinks,
            links.referring_domains,
            links.domain_authority,
        ));

        let dist = &result.keywords.ranking_distribution;
        let keyword_rows: String = result
            .keywords
            .tracked_keywords
            .iter()
            .map(|kw| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    html_escape(&kw.keyword),
                    kw.position
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    kw.search_volume,
                    kw.difficulty,
                )
            })
            .collect();
        sections.push_str(&format!(
            "<section><h2>Keywords</h2>{}\
             <p>Top 3: {} &middot; Top 10: {} &middot; Top 50: {} &middot; Unranked: {}</p>\
             <table><tr><th>Keyword</th><th>Position</th><th>Volume</th><th>Difficulty</th></tr>{}</table></section>\n",
            source_badge(result.keywords.source),
            dist.top_3,
            dist.top_10,
            dist.top_50,
            dist.unranked,
            keyword_rows,
        ));

        let competitor_rows: String = result
            .competitors
            .iter()
            .map(|c| {
                format!(
                    "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    html_escape(&c.domain),
                    c.domain_authority,
                    c.total_backlinks,
                    c.referring_domains,
                    c.estimated_traffic,
                )
            })
            .collect();
        sections.push_str(&format!(
            "<section><h2>Competitors</h2>\
             <table><tr><th>Domain</th><th>Authority</th><th>Backlinks</th><th>Referring domains</th><th>Est. traffic</th></tr>{}</table></section>\n",
            competitor_rows,
        ));

        let social_items: String = result
            .social_media
            .platforms
            .iter()
            .map(|p| {
                format!(
                    "<li>{}: {}</li>",
                    html_escape(&p.platform),
                    if p.present {
                        format!("present ({} followers)", p.followers)
                    } else {
                        "not found".to_string()
                    }
                )
            })
            .collect();
        sections.push_str(&format!(
            "<section><h2>Social media</h2>{}<ul>{}</ul></section>\n",
            source_badge(result.social_media.source),
            social_items,
        ));

        let rec_items: String = recommendations(tech)
            .iter()
            .map(|r| format!("<li>{}</li>", r))
            .collect();
        sections.push_str(&format!(
            "<section><h2>Recommendations</h2><ol>{}</ol></section>\n",
            rec_items,
        ));

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>SEO Audit Report - {company}</title>
<style>
body {{ margin: 0; padding: 2rem; font-family: system-ui, sans-serif; background: {bg}; color: {fg}; }}
h1, h2 {{ color: {accent}; }}
table {{ border-collapse: collapse; }}
td, th {{ padding: 0.25rem 0.75rem; border: 1px solid {accent}33; text-align: left; }}
.badge {{ font-size: 0.7rem; padding: 0.1rem 0.4rem; border: 1px solid {accent}; border-radius: 0.5rem; }}
</style>
</head>
<body>
<h1>SEO Audit Report</h1>
<p><strong>{company}</strong> &middot; {website}</p>
<p>Pages sampled: {pages} of {discovered} discovered</p>
{sections}
<footer><p>Generated {generated}</p></footer>
</body>
</html>
"#,
            company = html_escape(&customer.company_name),
            website = html_escape(&customer.website),
            pages = result.crawl.pages.len(),
            discovered = result.crawl.pages_discovered,
            sections = sections,
            generated = generated_at.to_rfc3339(),
            bg = bg,
            fg = fg,
            accent = accent,
        )
    }
}

fn source_badge(source: DataSource) -> &'static str {
    match source {
        DataSource::Live => r#"<span class="badge">live</span>"#,
        DataSource::Synthetic => r#"<span class="badge">estimated</span>"#,
    }
}

fn render_technical_issues_csv(result: &AuditResult) -> String {
    let tech = &result.technical_seo;
    let mut csv = String::from(TECHNICAL_ISSUES_HEADER);
    csv.push('\n');

    csv.push_str(&check_row("https", tech.https, "Site served over HTTPS"));
    csv.push_str(&check_row(
        "mobile_responsive",
        tech.mobile_responsive,
        "Layout adapts to mobile viewports",
    ));
    csv.push_str(&check_row("sitemap", tech.sitemap, "XML sitemap published"));
    csv.push_str(&check_row(
        "robots_txt",
        tech.robots_txt,
        "robots.txt present",
    ));
    csv.push_str(&check_row(
        "canonical",
        tech.canonical,
        "Canonical URLs declared",
    ));
    csv.push_str(&check_row(
        "meta_description",
        tech.meta_description,
        "Meta descriptions present",
    ));
    csv.push_str(&check_row(
        "schema_markup",
        tech.schema_markup,
        "Structured data markup found",
    ));
    csv.push_str(&check_row(
        "heading_structure",
        tech.heading_structure,
        "Single H1 with coherent hierarchy",
    ));
    csv.push_str(&check_row(
        "image_alt_coverage",
        tech.image_alt_coverage >= 0.8,
        &format!("{:.0}% of images carry alt text", tech.image_alt_coverage * 100.0),
    ));

    csv
}

fn render_keyword_opportunities_csv(result: &AuditResult) -> String {
    let mut csv = String::from(KEYWORD_OPPORTUNITIES_HEADER);
    csv.push('\n');

    for kw in &result.keywords.tracked_keywords {
        csv.push_str(&format!(
            "{},{},{},{}\n",
            csv_escape(&kw.keyword),
            kw.position
                .map(|p| p.to_string())
                .unwrap_or_else(|| "unranked".to_string()),
            kw.search_volume,
            kw.difficulty,
        ));
    }

    csv
}

fn render_competitor_comparison_csv(result: &AuditResult) -> String {
    let mut csv = String::from(COMPETITOR_COMPARISON_HEADER);
    csv.push('\n');

    for c in &result.competitors {
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            csv_escape(&c.domain),
            c.domain_authority,
            c.total_backlinks,
            c.referring_domains,
            c.estimated_traffic,
            c.common_keywords,
        ));
    }

    csv
}
