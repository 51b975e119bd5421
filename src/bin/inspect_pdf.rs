use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use std::env;

const TEXT_OPERATORS: [&str; 5] = ["BT", "ET", "Tf", "Td", "Tj"];

fn info_entry(doc: &Document, key: &[u8]) -> Option<String> {
    let info = match doc.trailer.get(b"Info").ok()? {
        Object::Reference(id) => doc.get_dictionary(*id).ok()?,
        Object::Dictionary(d) => d,
        _ => return None,
    };
    match info.get(key).ok()? {
        Object::String(bytes, _) => Some(String::from_utf8_lossy(bytes).into_owned()),
        other => Some(format!("{:?}", other)),
    }
}

fn describe_operand(obj: &Object) -> String {
    match obj {
        Object::String(bytes, _) => format!("({})", String::from_utf8_lossy(bytes)),
        Object::Name(name) => format!("/{}", String::from_utf8_lossy(name)),
        Object::Integer(i) => i.to_string(),
        Object::Real(r) => format!("{:.2}", r),
        other => format!("{:?}", other),
    }
}

fn dump_page(doc: &Document, number: u32, page_id: ObjectId) {
    println!("Page {} => {:?}", number, page_id);

    if let Ok(media_box) = doc
        .get_dictionary(page_id)
        .and_then(|page| page.get(b"MediaBox"))
        .and_then(|mb| mb.as_array())
    {
        let dims: Vec<String> = media_box.iter().map(describe_operand).collect();
        println!("  MediaBox: [{}]", dims.join(" "));
    }

    match doc.get_page_fonts(page_id) {
        Ok(fonts) => {
            for (name, font) in fonts {
                let base = font
                    .get(b"BaseFont")
                    .and_then(|b| b.as_name())
                    .map(|b| String::from_utf8_lossy(b).into_owned())
                    .unwrap_or_else(|_| "<none>".to_string());
                println!("  Font /{} => {}", String::from_utf8_lossy(&name), base);
            }
        }
        Err(e) => println!("  failed to read fonts: {:?}", e),
    }

    let content = match doc.get_page_content(page_id).and_then(|bytes| Content::decode(&bytes)) {
        Ok(c) => c,
        Err(e) => {
            println!("  failed to decode content: {:?}", e);
            return;
        }
    };
    let images = content.operations.iter().filter(|op| op.operator == "Do").count();
    println!("  {} operations, {} image(s)", content.operations.len(), images);
    for op in content
        .operations
        .iter()
        .filter(|op| TEXT_OPERATORS.contains(&op.operator.as_str()))
    {
        let operands: Vec<String> = op.operands.iter().map(describe_operand).collect();
        println!("    {} {}", operands.join(" "), op.operator);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: inspect_pdf <file.pdf>");
        std::process::exit(2);
    }
    let doc = match Document::load(&args[1]) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("failed to load: {:?}", e);
            std::process::exit(1)
        }
    };

    println!("PDF version: {}", doc.version);
    match info_entry(&doc, b"Title") {
        Some(title) => println!("Info.Title: {}", title),
        None => println!("No Info dictionary present in trailer"),
    }
    if let Some(author) = info_entry(&doc, b"Author") {
        println!("Info.Author: {}", author);
    }

    let pages = doc.get_pages();
    println!("Pages: {}", pages.len());
    for (number, page_id) in pages {
        dump_page(&doc, number, page_id);
    }
}
