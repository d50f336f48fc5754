use crate::fetch::LoadError;
use crate::models::{
    Bill, MemberCredential, PersonShare, Tab, TabImage, TabMember, TabPersonTotal, TabSettlement,
};
use crate::venmo::{build_venmo_deep_link, build_venmo_web_url, find_venmo_handle, format_amount};
use chrono::{DateTime, NaiveDate};

pub fn render_index() -> String {
    page(
        "Billington",
        r#"<section class="message">
      <h1>Billington</h1>
      <p>Shared-expense bills and tabs, rendered from a link. Open a bill
      (<code>/b/&lt;id&gt;?t=&lt;token&gt;</code>) or a tab
      (<code>/t/&lt;id&gt;?t=&lt;token&gt;</code>) to get started.</p>
    </section>"#,
    )
}

/// Hard precondition page: rendered before any backend request when the `t`
/// query parameter is missing.
pub fn render_token_required(kind: &str) -> String {
    let content = format!(
        r#"<section class="message">
      <h1>Access Token Required</h1>
      <p>This {kind} requires a valid access token to view.</p>
    </section>"#
    );
    page("Access Token Required", &content)
}

/// One page per terminal fetcher state, each distinguishable from the others.
/// Only the exhausted case offers a retry affordance.
pub fn render_load_error(kind: &str, error: LoadError, retry_href: &str) -> String {
    let (title, body, action) = match error {
        LoadError::InvalidToken => (
            "Invalid Access Token".to_string(),
            format!("The access token provided is not valid for this {kind}."),
            None,
        ),
        LoadError::NotFound => (
            format!("{} Not Found", titlecase(kind)),
            format!("The {kind} you are looking for does not exist or has been removed."),
            None,
        ),
        LoadError::Failed => (
            "Something Went Wrong".to_string(),
            format!(
                "We couldn't load this {kind} after several attempts. \
                 The server may be temporarily unavailable."
            ),
            Some(("Try Again", retry_href)),
        ),
    };

    let action_html = action
        .map(|(label, href)| format!(r#"<a class="btn" href="{}">{label}</a>"#, html_escape(href)))
        .unwrap_or_default();
    let content = format!(
        r#"<section class="message">
      <h1>{}</h1>
      <p>{}</p>
      {action_html}
    </section>"#,
        html_escape(&title),
        html_escape(&body),
    );
    page(&title, &content)
}

pub fn render_bill_page(bill: &Bill) -> String {
    let venmo_handle = find_venmo_handle(&bill.payment_methods);

    let shares: String = bill
        .person_shares
        .iter()
        .map(|share| person_share_card(share, venmo_handle, "Split bill"))
        .collect();

    let content = format!(
        r#"<header class="page-head">
      <h1>{name}</h1>
      <p class="muted">{date}</p>
      <div class="total-pill"><span>Total</span><strong>{total}</strong></div>
    </header>
    {payment_methods}
    {breakdown}
    <section>
      <h2 class="section-label">Individual Shares</h2>
      {shares}
    </section>"#,
        name = html_escape(&bill.name),
        date = format_date(&bill.date),
        total = money(bill.total),
        payment_methods = payment_methods_html(bill),
        breakdown = breakdown_html(bill),
    );
    page(&bill.name, &content)
}

#[allow(clippy::too_many_arguments)]
pub fn render_tab_page(
    tab: &Tab,
    person_totals: &[TabPersonTotal],
    settlements: &[TabSettlement],
    images: &[TabImage],
    members: &[TabMember],
    joined: Option<&MemberCredential>,
    api_base_url: &str,
    token: &str,
    join_error: Option<&str>,
) -> String {
    // Any bill's Venmo method serves the whole tab.
    let venmo_handle = tab
        .bills
        .iter()
        .find_map(|bill| find_venmo_handle(&bill.payment_methods));

    let balances = if tab.finalized && !settlements.is_empty() {
        settlements_html(settlements, venmo_handle)
    } else if !person_totals.is_empty() {
        person_totals_html(person_totals, venmo_handle)
    } else {
        String::new()
    };

    let bills: String = tab
        .bills
        .iter()
        .map(|bill| {
            let handle = find_venmo_handle(&bill.payment_methods);
            let shares: String = bill
                .person_shares
                .iter()
                .map(|share| person_share_card(share, handle, "Split bill"))
                .collect();
            format!(
                r#"<details class="card">
          <summary>{name} &middot; {total}</summary>
          <div class="card-body">{shares}</div>
        </details>"#,
                name = html_escape(&bill.name),
                total = money(bill.total),
            )
        })
        .collect();

    let description = if tab.description.is_empty() {
        String::new()
    } else {
        format!(r#"<p class="muted">{}</p>"#, html_escape(&tab.description))
    };
    let finalized_badge = if tab.finalized {
        r#"<span class="badge ok">Finalized</span>"#
    } else {
        ""
    };
    let bill_count = tab.bills.len();
    let bill_word = if bill_count == 1 { "bill" } else { "bills" };

    let content = format!(
        r#"<header class="page-head">
      <h1>{name}</h1>
      {description}
      <div class="total-pill"><span>Total</span><strong>{total}</strong></div>
      <p><span class="badge">{bill_count} {bill_word}</span> {finalized_badge}</p>
    </header>
    {join}
    {balances}
    {gallery}
    {members}
    <section>
      <h2 class="section-label">Bills</h2>
      {bills}
    </section>"#,
        name = html_escape(&tab.name),
        total = money(tab.total_amount),
        join = join_html(tab.id, token, joined, join_error),
        gallery = image_gallery_html(images, api_base_url),
        members = members_html(members),
    );
    page(&tab.name, &content)
}

fn person_share_card(share: &PersonShare, venmo_handle: Option<&str>, note_prefix: &str) -> String {
    let items: String = share
        .items
        .iter()
        .map(|item| {
            let shared = if item.is_shared {
                r#" <span class="muted">(shared)</span>"#
            } else {
                ""
            };
            format!(
                r#"<div class="row"><span>{}{shared}</span><span class="mono">{}</span></div>"#,
                html_escape(&item.name),
                money(item.amount),
            )
        })
        .collect();

    let content = format!(
        r#"{items}
        <div class="row muted"><span>Tax</span><span class="mono">{tax}</span></div>
        <div class="row muted"><span>Tip</span><span class="mono">{tip}</span></div>
        {pay}"#,
        tax = money(share.tax_share),
        tip = money(share.tip_share),
        pay = venmo_button(
            venmo_handle,
            share.total,
            &format!("{note_prefix} - {}", share.person_name),
        ),
    );

    format!(
        r#"<details class="card">
      <summary>{name} &middot; {total}</summary>
      <div class="card-body">{content}</div>
    </details>"#,
        name = html_escape(&share.person_name),
        total = money(share.total),
    )
}

fn payment_methods_html(bill: &Bill) -> String {
    if bill.payment_methods.is_empty() {
        return String::new();
    }
    let rows: String = bill
        .payment_methods
        .iter()
        .map(|method| {
            format!(
                r#"<div class="row"><span class="muted">{}</span><strong>{}</strong></div>"#,
                html_escape(&method.name),
                html_escape(&method.identifier),
            )
        })
        .collect();
    format!(
        r#"<section>
      <h2 class="section-label">Payment Methods</h2>
      <div class="card open">{rows}</div>
    </section>"#
    )
}

fn breakdown_html(bill: &Bill) -> String {
    let items: String = bill
        .items
        .iter()
        .map(|item| {
            format!(
                r#"<div class="row"><span>{}</span><span class="mono">{}</span></div>"#,
                html_escape(&item.name),
                money(item.price),
            )
        })
        .collect();
    format!(
        r#"<section>
      <details class="card">
        <summary>Items</summary>
        <div class="card-body">{items}</div>
      </details>
      <details class="card">
        <summary>Breakdown</summary>
        <div class="card-body">
          <div class="row"><span class="muted">Subtotal</span><span class="mono">{subtotal}</span></div>
          <div class="row"><span class="muted">Tax</span><span class="mono">{tax}</span></div>
          <div class="row"><span class="muted">Tip ({tip_pct}%)</span><span class="mono">{tip}</span></div>
        </div>
      </details>
    </section>"#,
        subtotal = money(bill.subtotal),
        tax = money(bill.tax),
        tip_pct = bill.tip_percentage,
        tip = money(bill.tip_amount),
    )
}

fn person_totals_html(person_totals: &[TabPersonTotal], venmo_handle: Option<&str>) -> String {
    let rows: String = person_totals
        .iter()
        .map(|person| {
            let bill_word = if person.bill_count == 1 { "bill" } else { "bills" };
            format!(
                r#"<div class="card open row">
          <span><strong>{name}</strong> <span class="muted">{count} {bill_word}</span></span>
          <span class="mono">{total} {pay}</span>
        </div>"#,
                name = html_escape(&person.person_name),
                count = person.bill_count,
                total = money(person.total),
                pay = venmo_button(
                    venmo_handle,
                    person.total,
                    &format!("Tab settlement - {}", person.person_name),
                ),
            )
        })
        .collect();
    format!(
        r#"<section>
      <h2 class="section-label">Per Person Totals</h2>
      {rows}
    </section>"#
    )
}

fn settlements_html(settlements: &[TabSettlement], venmo_handle: Option<&str>) -> String {
    let paid_count = settlements.iter().filter(|s| s.paid).count();
    let rows: String = settlements
        .iter()
        .map(|settlement| {
            let pay = if settlement.paid {
                r#"<span class="badge ok">Paid</span>"#.to_string()
            } else {
                venmo_button(
                    venmo_handle,
                    settlement.amount,
                    &format!("Tab settlement - {}", settlement.person_name),
                )
            };
            let class = if settlement.paid { "card open row paid" } else { "card open row" };
            format!(
                r#"<div class="{class}">
          <span><strong>{name}</strong></span>
          <span class="mono">{amount} {pay}</span>
        </div>"#,
                name = html_escape(&settlement.person_name),
                amount = money(settlement.amount),
            )
        })
        .collect();
    format!(
        r#"<section>
      <h2 class="section-label">Settlements <span class="badge ok">{paid_count}/{} paid</span></h2>
      {rows}
    </section>"#,
        settlements.len(),
    )
}

fn image_gallery_html(images: &[TabImage], api_base_url: &str) -> String {
    if images.is_empty() {
        return String::new();
    }
    let processed_count = images.iter().filter(|img| img.processed).count();
    let cells: String = images
        .iter()
        .enumerate()
        .map(|(index, image)| {
            let src = html_escape(&format!("{api_base_url}{}", image.url));
            format!(
                r#"<a href="{src}" target="_blank"><img src="{src}" alt="Receipt {}"></a>"#,
                index + 1,
            )
        })
        .collect();
    format!(
        r#"<section>
      <h2 class="section-label">Receipts <span class="badge">{processed_count}/{} processed</span></h2>
      <div class="gallery">{cells}</div>
    </section>"#,
        images.len(),
    )
}

fn members_html(members: &[TabMember]) -> String {
    if members.is_empty() {
        return String::new();
    }
    let chips: String = members
        .iter()
        .map(|member| {
            let marker = if member.role == "creator" { "&#9733; " } else { "" };
            format!(
                r#"<span class="badge">{marker}{}</span> "#,
                html_escape(&member.display_name),
            )
        })
        .collect();
    format!(
        r#"<section>
      <h2 class="section-label">Members</h2>
      <p>{chips}</p>
    </section>"#
    )
}

fn join_html(
    tab_id: i64,
    token: &str,
    joined: Option<&MemberCredential>,
    join_error: Option<&str>,
) -> String {
    if let Some(credential) = joined {
        return format!(
            r#"<p class="joined badge ok">Joined as {}</p>"#,
            html_escape(&credential.display_name),
        );
    }
    let error = join_error
        .map(|message| format!(r#"<p class="error">{}</p>"#, html_escape(message)))
        .unwrap_or_default();
    format!(
        r#"<form class="join" method="post" action="/t/{tab_id}/join?t={token}">
      <input type="text" name="display_name" placeholder="Your name" maxlength="30" required>
      <button type="submit">Join this trip</button>
      {error}
    </form>"#,
        token = html_escape(token),
    )
}

/// Pay affordance: the href fires the native intent while the embedded
/// fallback script arms a 1.5s redirect to the web URL.
fn venmo_button(venmo_handle: Option<&str>, amount: f64, note: &str) -> String {
    let Some(handle) = venmo_handle else {
        return String::new();
    };
    let amount = format_amount(amount);
    format!(
        r#"<a class="btn pay" href="{deep}" data-venmo-web="{web}">Pay with Venmo</a>"#,
        deep = html_escape(&build_venmo_deep_link(handle, &amount, note)),
        web = html_escape(&build_venmo_web_url(handle, &amount, note)),
    )
}

pub fn html_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn money(amount: f64) -> String {
    format!("${amount:.2}")
}

fn titlecase(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Friendly date for display; backend strings that fail to parse are shown
/// verbatim.
fn format_date(raw: &str) -> String {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(raw) {
        return datetime.format("%b %-d, %Y").to_string();
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%b %-d, %Y").to_string();
    }
    raw.to_string()
}

fn page(title: &str, content: &str) -> String {
    PAGE_HTML
        .replace("{{TITLE}}", &html_escape(title))
        .replace("{{CONTENT}}", content)
}

const PAGE_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    :root {
      --bg: #f6f4ef;
      --ink: #262523;
      --primary: #0074de;
      --muted: #76716a;
      --card: #ffffff;
      --border: rgba(38, 37, 35, 0.1);
      --ok: #217a4b;
    }

    * { box-sizing: border-box; }

    body {
      margin: 0;
      min-height: 100vh;
      background: var(--bg);
      color: var(--ink);
      font-family: "Helvetica Neue", Arial, sans-serif;
      padding: 32px 16px 48px;
    }

    main { max-width: 680px; margin: 0 auto; }

    h1 { margin: 0 0 4px; font-size: 1.7rem; }

    .muted { color: var(--muted); font-size: 0.9rem; }
    .mono { font-family: "SF Mono", "Consolas", monospace; font-weight: 600; }

    .page-head { margin-bottom: 28px; }

    .total-pill {
      display: inline-flex;
      align-items: center;
      gap: 10px;
      background: var(--card);
      border: 1px solid var(--border);
      border-radius: 999px;
      padding: 8px 18px;
      margin-top: 10px;
    }
    .total-pill span { color: var(--muted); font-size: 0.85rem; }
    .total-pill strong { font-size: 1.2rem; }

    .section-label {
      font-size: 0.75rem;
      text-transform: uppercase;
      letter-spacing: 0.1em;
      color: var(--muted);
      margin: 24px 0 10px;
    }

    .card {
      background: var(--card);
      border: 1px solid var(--border);
      border-radius: 14px;
      padding: 14px 18px;
      margin-bottom: 10px;
    }
    .card summary { cursor: pointer; font-weight: 600; }
    .card-body { padding-top: 10px; }

    .row {
      display: flex;
      justify-content: space-between;
      align-items: center;
      gap: 12px;
      padding: 4px 0;
    }
    .row.paid { opacity: 0.65; text-decoration: line-through; }

    .badge {
      display: inline-block;
      background: var(--card);
      border: 1px solid var(--border);
      border-radius: 999px;
      padding: 2px 10px;
      font-size: 0.8rem;
      color: var(--muted);
    }
    .badge.ok { color: var(--ok); border-color: var(--ok); }

    .btn {
      display: inline-block;
      background: var(--primary);
      color: white;
      border: none;
      border-radius: 10px;
      padding: 8px 14px;
      font-weight: 600;
      text-decoration: none;
      cursor: pointer;
    }

    .gallery { display: grid; grid-template-columns: repeat(3, 1fr); gap: 8px; }
    .gallery img { width: 100%; aspect-ratio: 1; object-fit: cover; border-radius: 10px; }

    .join { margin-bottom: 20px; }
    .join input {
      padding: 9px 12px;
      border: 1px solid var(--border);
      border-radius: 10px;
      margin-right: 6px;
    }
    .join button {
      background: var(--primary);
      color: white;
      border: none;
      border-radius: 10px;
      padding: 9px 14px;
      font-weight: 600;
      cursor: pointer;
    }
    .error { color: #c63b2b; font-size: 0.9rem; }

    .message {
      text-align: center;
      background: var(--card);
      border: 1px solid var(--border);
      border-radius: 18px;
      padding: 44px 28px;
      margin-top: 10vh;
    }

    footer { text-align: center; margin-top: 40px; }
  </style>
</head>
<body>
  <main>
    {{CONTENT}}
    <footer><p class="muted">&copy; Kruski Ko. All rights reserved.</p></footer>
  </main>

  <script>
    // Native-first payment handoff: follow the venmo:// href, and if the app
    // has not taken over within 1.5s redirect to the web pay page. The timer
    // is cleared on pagehide so a successful handoff never double-navigates.
    let venmoFallbackTimer = null;

    document.addEventListener('click', (event) => {
      const link = event.target.closest('a[data-venmo-web]');
      if (!link) {
        return;
      }
      if (venmoFallbackTimer) {
        clearTimeout(venmoFallbackTimer);
      }
      const webUrl = link.dataset.venmoWeb;
      venmoFallbackTimer = setTimeout(() => {
        window.location.href = webUrl;
      }, 1500);
    });

    window.addEventListener('pagehide', () => {
      if (venmoFallbackTimer) {
        clearTimeout(venmoFallbackTimer);
        venmoFallbackTimer = null;
      }
    });
  </script>
</body>
</html>
"#;
