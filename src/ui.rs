use crate::models::{DemandPage, MixPage, SupplyPage};
use chrono::{DateTime, Local};
use html_escape::encode_text;

pub fn render_index() -> String {
    layout("彰化縣醫療資源儀表板", "/", INDEX_BODY)
}

pub fn render_supply(page: &SupplyPage) -> String {
    let hospital_rows: Vec<[String; 4]> = page
        .hospitals
        .iter()
        .map(|a| {
            [
                a.name.clone(),
                count(a.attrs.total),
                count(a.attrs.hospitals),
                count(a.attrs.clinics),
            ]
        })
        .collect();
    let bed_rows: Vec<[String; 3]> = page
        .beds
        .iter()
        .map(|a| [a.name.clone(), count(a.attrs.general), count(a.attrs.special)])
        .collect();

    let body = SUPPLY_BODY
        .replace("{{HOSPITAL_CHART}}", &page.hospital_chart)
        .replace(
            "{{HOSPITAL_TABLE}}",
            &table(&["鄉鎮市", "合計", "醫院數", "診所數"], &hospital_rows),
        )
        .replace("{{BED_CHART}}", &page.bed_chart)
        .replace(
            "{{BED_TABLE}}",
            &table(&["鄉鎮市", "一般病床", "特殊病床"], &bed_rows),
        )
        .replace("{{PREPARED}}", &prepared(&page.prepared_at));
    layout("醫療資源供給", "/supply", &body)
}

pub fn render_demand(page: &DemandPage) -> String {
    let rows: Vec<[String; 4]> = page
        .areas
        .iter()
        .zip(&page.scheme.classes)
        .map(|(a, class)| {
            [
                a.name.clone(),
                count(a.attrs.total),
                count(a.attrs.elderly),
                format!("{:.2}% (第 {} 級)", a.attrs.ratio, class + 1),
            ]
        })
        .collect();

    let body = DEMAND_BODY
        .replace("{{CHART}}", &page.chart)
        .replace(
            "{{TABLE}}",
            &table(&["鄉鎮市", "總人口", "65歲以上", "老年人口占比"], &rows),
        )
        .replace("{{CLASSES}}", &page.scheme.class_count().to_string())
        .replace("{{PREPARED}}", &prepared(&page.prepared_at));
    layout("高齡醫療需求", "/demand", &body)
}

pub fn render_mix(page: &MixPage) -> String {
    let rows: Vec<[String; 4]> = page
        .areas
        .iter()
        .map(|a| {
            [
                a.name.clone(),
                count(a.attrs.elderly),
                format!("{:.2}", a.attrs.doctors_per_10k),
                a.attrs.class.clone(),
            ]
        })
        .collect();

    let body = MIX_BODY
        .replace("{{CHART}}", &page.chart)
        .replace(
            "{{TABLE}}",
            &table(&["鄉鎮市", "65歲以上人口", "每萬人醫師數", "雙變量類別"], &rows),
        )
        .replace("{{PREPARED}}", &prepared(&page.prepared_at));
    layout("供需綜合分析", "/mix", &body)
}

pub fn render_error_page(message: &str) -> String {
    let body = ERROR_BODY.replace("{{MESSAGE}}", &encode_text(message));
    layout("發生錯誤", "", &body)
}

fn layout(title: &str, active: &str, body: &str) -> String {
    let nav: String = NAV
        .iter()
        .map(|(href, label)| {
            let class = if *href == active { " class=\"active\"" } else { "" };
            format!("<a href=\"{href}\"{class}>{label}</a>")
        })
        .collect();
    LAYOUT_HTML
        .replace("{{TITLE}}", &encode_text(title))
        .replace("{{NAV}}", &nav)
        .replace("{{BODY}}", body)
}

fn table<const N: usize>(headers: &[&str; N], rows: &[[String; N]]) -> String {
    let mut html = String::from("<table><thead><tr>");
    for header in headers {
        html.push_str(&format!("<th>{}</th>", encode_text(header)));
    }
    html.push_str("</tr></thead><tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in row {
            html.push_str(&format!("<td>{}</td>", encode_text(cell)));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn count(value: f64) -> String {
    format!("{value:.0}")
}

fn prepared(at: &DateTime<Local>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

const NAV: [(&str, &str); 4] = [
    ("/", "首頁"),
    ("/supply", "醫療資源供給"),
    ("/demand", "高齡醫療需求"),
    ("/mix", "供需綜合分析"),
];

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="zh-Hant">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    @font-face {
      font-family: "Iansui";
      src: url("/assets/font.ttf") format("truetype");
      font-display: swap;
    }

    :root {
      --bg-1: #f3f6f4;
      --bg-2: #cfe6dc;
      --ink: #24312c;
      --accent: #c0392b;
      --accent-2: #2f4858;
      --card: rgba(255, 255, 255, 0.9);
      --shadow: 0 24px 60px rgba(47, 72, 88, 0.16);
    }

    * {
      box-sizing: border-box;
    }

    body {
      margin: 0;
      min-height: 100vh;
      background: radial-gradient(circle at top, var(--bg-2), transparent 60%),
        linear-gradient(135deg, var(--bg-1), #e8f1ec 60%, #f7f9f8 100%);
      color: var(--ink);
      font-family: "Iansui", "Noto Sans TC", sans-serif;
      display: grid;
      justify-items: center;
      padding: 32px 18px 48px;
    }

    nav {
      width: min(960px, 100%);
      display: flex;
      flex-wrap: wrap;
      gap: 6px;
      padding: 6px;
      margin-bottom: 20px;
      background: rgba(47, 72, 88, 0.08);
      border-radius: 999px;
    }

    nav a {
      border-radius: 999px;
      padding: 8px 16px;
      font-weight: 600;
      color: #55615c;
      text-decoration: none;
    }

    nav a.active {
      background: white;
      color: var(--accent-2);
      box-shadow: 0 8px 16px rgba(47, 72, 88, 0.12);
    }

    .app {
      width: min(960px, 100%);
      background: var(--card);
      border-radius: 28px;
      box-shadow: var(--shadow);
      padding: 36px;
      display: grid;
      gap: 24px;
      animation: rise 600ms ease;
    }

    h1 {
      font-size: clamp(1.8rem, 4vw, 2.5rem);
      margin: 0;
    }

    h2 {
      margin: 0;
      font-size: 1.3rem;
    }

    .subtitle {
      margin: 0;
      color: #5f6b66;
      line-height: 1.7;
    }

    .chart-card {
      background: white;
      border-radius: 20px;
      padding: 16px;
      border: 1px solid rgba(47, 72, 88, 0.08);
      display: grid;
      gap: 12px;
    }

    .chart-card svg,
    .chart-card img {
      width: 100%;
      height: auto;
      display: block;
    }

    .chart-card svg text {
      font-family: "Iansui", sans-serif;
    }

    select {
      font: inherit;
      padding: 8px 14px;
      border-radius: 12px;
      border: 1px solid rgba(47, 72, 88, 0.25);
      background: white;
    }

    details summary {
      cursor: pointer;
      font-weight: 600;
      color: var(--accent-2);
    }

    table {
      width: 100%;
      border-collapse: collapse;
      margin-top: 12px;
      font-size: 0.95rem;
    }

    th,
    td {
      padding: 6px 10px;
      border-bottom: 1px solid rgba(47, 72, 88, 0.1);
      text-align: right;
    }

    th:first-child,
    td:first-child {
      text-align: left;
    }

    .banner {
      background: #fdecea;
      color: var(--accent);
      border-radius: 16px;
      padding: 18px;
      font-weight: 600;
    }

    .hint {
      margin: 0;
      color: #6f7a75;
      font-size: 0.9rem;
    }

    @keyframes rise {
      from {
        opacity: 0;
        transform: translateY(18px);
      }
      to {
        opacity: 1;
        transform: translateY(0);
      }
    }

    @media (max-width: 600px) {
      .app {
        padding: 24px 18px;
      }
    }
  </style>
</head>
<body>
  <nav>{{NAV}}</nav>
  <main class="app">
{{BODY}}
  </main>
</body>
</html>
"#;

const INDEX_BODY: &str = r#"    <header>
      <h1>彰化縣醫療資源與高齡人口</h1>
    </header>
    <p class="subtitle">世界衛生組織 (WHO) 將 65 歲以上人口占總人口 7% 定義為高齡化社會、14% 為高齡社會、20% 為超高齡社會。
      彰化縣多數鄉鎮已跨過高齡社會門檻，醫療需求隨之上升，而醫院、診所、病床與醫師卻集中在少數市鎮。
      本儀表板比較各鄉鎮市的醫療資源供給與高齡人口需求，找出資源相對不足的地區。</p>
    <p class="subtitle">
      <a href="/supply">醫療資源供給</a>：醫院與診所數量、一般與特殊病床。
      <a href="/demand">高齡醫療需求</a>：65 歲以上人口占比。
      <a href="/mix">供需綜合分析</a>：高齡人口與每萬人醫師數的雙變量地圖。
    </p>
    <section class="chart-card">
      <label for="chart-select"><h2>地圖瀏覽</h2></label>
      <select id="chart-select">
        <option value="/charts/hospitals.svg">醫院與診所分布</option>
        <option value="/charts/beds.svg">病床組成</option>
        <option value="/charts/elderly.svg">老年人口占比</option>
        <option value="/charts/bivariate.svg">高齡人口與醫師資源</option>
      </select>
      <img id="chart-image" src="/charts/hospitals.svg" alt="彰化縣地圖" />
      <p class="hint">地圖於第一次開啟時下載資料並繪製，之後直接使用已準備好的結果。</p>
    </section>
    <script>
      const select = document.getElementById('chart-select');
      const image = document.getElementById('chart-image');
      select.addEventListener('change', () => {
        image.src = select.value;
      });
    </script>"#;

const SUPPLY_BODY: &str = r#"    <header>
      <h1>醫療資源供給</h1>
    </header>
    <p class="subtitle">圓形大小代表各鄉鎮市醫院與診所的總數；甜甜圈圖顯示一般病床與特殊病床的比例。</p>
    <section class="chart-card">
      {{HOSPITAL_CHART}}
      <details>
        <summary>醫院與診所數量明細</summary>
        {{HOSPITAL_TABLE}}
      </details>
    </section>
    <section class="chart-card">
      {{BED_CHART}}
      <details>
        <summary>病床數量明細</summary>
        {{BED_TABLE}}
      </details>
    </section>
    <p class="hint">資料準備時間：{{PREPARED}}</p>"#;

const DEMAND_BODY: &str = r#"    <header>
      <h1>高齡醫療需求</h1>
    </header>
    <p class="subtitle">各鄉鎮市 65 歲以上人口占總人口的比例，以分位數分為 {{CLASSES}} 級，顏色越深代表高齡人口比例越高。</p>
    <section class="chart-card">
      {{CHART}}
      <details>
        <summary>老年人口占比明細</summary>
        {{TABLE}}
      </details>
    </section>
    <p class="hint">資料準備時間：{{PREPARED}}</p>"#;

const MIX_BODY: &str = r#"    <header>
      <h1>供需綜合分析</h1>
    </header>
    <p class="subtitle">將 65 歲以上人口與每萬人醫師數各分為低、中、高三級後組合成九類。
      高齡人口多而醫師少的地區 (類別 31) 為醫療資源最需補強之處。</p>
    <section class="chart-card">
      {{CHART}}
      <details>
        <summary>雙變量分類明細</summary>
        {{TABLE}}
      </details>
    </section>
    <p class="hint">資料準備時間：{{PREPARED}}</p>"#;

const ERROR_BODY: &str = r#"    <header>
      <h1>無法顯示此頁面</h1>
    </header>
    <div class="banner" role="alert">{{MESSAGE}}</div>
    <p class="hint"><a href="/">回到首頁</a></p>"#;
