use std::fmt::Write as _;

use crate::models::Listing;

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

const STYLE: &str = "body{font-family:system-ui,sans-serif;margin:2rem;color:#222}\
table{border-collapse:collapse;width:100%}\
th,td{border:1px solid #ddd;padding:.4rem .6rem;text-align:left}\
th{background:#f4f4f4}\
nav{margin:1rem 0;display:flex;gap:1rem;align-items:center}\
button{cursor:pointer}";

const DELETE_SCRIPT: &str = "async function borrar(id){\
if(!confirm('¿Eliminar la reserva #'+id+'?'))return;\
const res=await fetch('/api/reservas/'+id,{method:'DELETE'});\
if(!res.ok){alert('No se pudo eliminar ('+res.status+')');return;}\
location.reload();}";

/// Renders the paginated admin table with per-row delete buttons.
pub fn render_admin_page(listing: &Listing) -> String {
    let mut html = String::with_capacity(2048 + listing.rows.len() * 256);

    let _ = write!(
        html,
        "<!doctype html><html lang=\"es\"><head><meta charset=\"utf-8\">\
         <title>NovaDesk · Reservas</title><style>{STYLE}</style></head><body>\
         <h1>Pre check-in</h1>\
         <p>Total: <strong>{total}</strong> · Página {page} de {pages} · \
         <a href=\"/api/reservas.csv?page={page}&amp;size={size}\">Exportar CSV</a></p>",
        total = listing.total,
        page = listing.page,
        pages = listing.page_count,
        size = listing.size,
    );

    html.push_str(
        "<table><thead><tr><th>ID</th><th>Apellido</th><th>Reserva</th>\
         <th>Creado (UTC)</th><th></th></tr></thead><tbody>",
    );

    if listing.rows.is_empty() {
        html.push_str("<tr><td colspan=\"5\">Sin reservas en esta página.</td></tr>");
    }

    for row in &listing.rows {
        let _ = write!(
            html,
            "<tr><td>{id}</td><td>{name}</td><td>{number}</td><td>{created}</td>\
             <td><button onclick=\"borrar({id})\">Eliminar</button></td></tr>",
            id = row.id,
            name = escape_html(&row.last_name),
            number = escape_html(&row.booking_number),
            created = escape_html(&row.created_at_iso()),
        );
    }
    html.push_str("</tbody></table><nav>");

    if listing.page > 1 {
        let _ = write!(
            html,
            "<a href=\"/admin?page={prev}&amp;size={size}\">« Anterior</a>",
            prev = u64::from(listing.page - 1).min(listing.page_count),
            size = listing.size,
        );
    }
    if u64::from(listing.page) < listing.page_count {
        let _ = write!(
            html,
            "<a href=\"/admin?page={next}&amp;size={size}\">Siguiente »</a>",
            next = listing.page + 1,
            size = listing.size,
        );
    }

    let _ = write!(html, "</nav><script>{DELETE_SCRIPT}</script></body></html>");
    html
}
