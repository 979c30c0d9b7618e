pub mod sections;
pub mod splitter;

use anyhow::Result;

use crate::html;
use crate::lookup::SectionKind;
use crate::model::{Lang, RawParseResult, RawRelease};

/// Split one language's detail page and run every section parser.
/// Missing sections produce empty defaults; only an unusable body is
/// an error.
pub fn parse_page(markup: &str, hum_id: &str, lang: Lang) -> Result<RawParseResult> {
    let doc = html::parse_document(markup);
    let split = splitter::split_page(&doc, hum_id, lang)?;

    Ok(RawParseResult {
        hum_id: hum_id.to_string(),
        lang,
        summary: sections::summary::parse(split.get(SectionKind::Summary), hum_id, lang),
        molecular_data: sections::molecular_data::parse(
            split.get(SectionKind::MolecularData),
            hum_id,
            lang,
        ),
        data_provider: sections::data_provider::parse(
            split.get(SectionKind::DataProvider),
            hum_id,
            lang,
        ),
        publications: sections::publications::parse(
            split.get(SectionKind::Publications),
            hum_id,
            lang,
        ),
        controlled_access_users: sections::controlled_access::parse(
            split.get(SectionKind::ControlledAccessUsers),
            hum_id,
            lang,
        ),
        releases: RawRelease::default(),
    })
}

/// Parse the separate release-history markup for a page, when present.
pub fn parse_release_page(markup: &str, hum_id: &str, lang: Lang) -> Result<RawRelease> {
    let doc = html::parse_document(markup);
    let children = html::body_children(&doc)?;
    Ok(sections::release::parse(Some(&children), hum_id, lang))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "<body>\
        <p>portal navigation</p>\
        <h2>概要</h2>\
        <p><b>目的：</b>疾患関連変異の同定。</p>\
        <p><b>方法：</b>全ゲノムシークエンス</p>\
        <table>\
        <tr><td>データセットID</td><td>データの種別</td><td>制限</td><td>公開日</td></tr>\
        <tr><td>JGAD000001</td><td>WGS</td><td>制限公開（Type I）</td><td>2020/1/5</td></tr>\
        </table>\
        <h2>分子データ</h2>\
        <p>JGAD000001 全ゲノム</p>\
        <table><tr><td>規模</td><td>100検体</td></tr></table>\
        <h2>提供者情報</h2>\
        <p>研究代表者：山田 太郎</p>\
        <p>所属機関：東京大学</p>\
        <h2>発表論文</h2>\
        <table>\
        <tr><td></td><td>タイトル</td><td>DOI</td><td>データセットID</td></tr>\
        <tr><td>1.</td><td>論文A</td><td>10.1000/a</td><td>JGAD000001</td></tr>\
        </table>\
        <h2>制限公開データの利用者一覧</h2>\
        <table>\
        <tr><td>研究代表者</td><td>所属機関</td><td>利用データID</td><td>利用期間</td></tr>\
        <tr><td>佐藤 花子</td><td>京都大学</td><td>JGAD000001</td><td>2021/4/1-2023/3/31</td></tr>\
        </table>\
        </body>";

    #[test]
    fn whole_page_parses() {
        let r = parse_page(PAGE, "hum0001", Lang::Ja).unwrap();
        assert_eq!(r.summary.aims.len(), 1);
        assert_eq!(r.summary.datasets.len(), 1);
        assert_eq!(r.molecular_data.len(), 1);
        assert_eq!(r.molecular_data[0].id.text, "JGAD000001 全ゲノム");
        assert_eq!(
            r.data_provider.principal_investigator.as_ref().unwrap().text,
            "山田 太郎"
        );
        assert_eq!(r.publications.len(), 1);
        assert_eq!(r.controlled_access_users.len(), 1);
    }

    #[test]
    fn empty_body_is_per_page_failure() {
        assert!(parse_page("<body></body>", "hum0001", Lang::Ja).is_err());
    }
}
