use crate::services::bulk_add::parse::template_header;
use actix_web::http::header::CONTENT_DISPOSITION;
use actix_web::{HttpResponse, Responder};

/// Serves a CSV file holding only the header row an upload must use.
pub async fn process() -> impl Responder {
    match render_template() {
        Ok(body) => HttpResponse::Ok()
            .content_type("text/csv; charset=utf-8")
            .insert_header((
                CONTENT_DISPOSITION,
                "attachment; filename=BulkPersonAddTemplate.csv",
            ))
            .body(body),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error: {}", e)),
    }
}

fn render_template() -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(template_header())?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}
