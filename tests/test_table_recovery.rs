//! Table-recovery integration tests: clean tables, headerless tables,
//! column leakage and unit inference.

use atesta::config::{CascadeConfig, TableConfig};
use atesta::table::{RawTable, TableRecovery};

fn recovery() -> TableRecovery {
    TableRecovery::new(&TableConfig::default(), &CascadeConfig::default())
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

// =============================================================================
// CLEAN DIGITAL TABLE (scenario: one page, four columns)
// =============================================================================

#[test]
fn test_clean_four_column_table() {
    let table = RawTable {
        rows: vec![
            row(&["ITEM", "DESCRIÇÃO", "UNIDADE", "QUANTIDADE"]),
            row(&["1.1", "Alvenaria de vedação", "M2", "416,65"]),
            row(&["1.2", "Pintura látex acrílica", "M2", "502,18"]),
        ],
        page: Some(1),
    };
    let outcome = recovery().recover(&[table]);

    assert_eq!(outcome.servicos.len(), 2);
    let first = &outcome.servicos[0];
    assert_eq!(first.item.as_ref().unwrap().to_string(), "1.1");
    assert_eq!(first.descricao, "Alvenaria de vedação");
    assert_eq!(first.unidade.as_deref(), Some("M2"));
    assert_eq!(first.quantidade, Some(416.65));

    let second = &outcome.servicos[1];
    assert_eq!(second.unidade.as_deref(), Some("M2"));
    assert_eq!(second.quantidade, Some(502.18));
}

// =============================================================================
// COLUMN LEAK (scenario: code digits leaked into the quantity column)
// =============================================================================

#[test]
fn test_column_leak_cleanup() {
    let mut rows = vec![row(&["ITEM", "DESCRIÇÃO", "UNID", "QTD"])];
    // 8 of 10 rows leak: quantity equals the digits of the code.
    for i in 1..=8u32 {
        rows.push(row(&[
            &format!("1.{}", i),
            "Execução de serviço padronizado de obra",
            "M2",
            &format!("1{}", i),
        ]));
    }
    rows.push(row(&["1.9", "Serviço com quantidade real", "M2", "350,00"]));
    rows.push(row(&["1.10", "Outro serviço com quantidade real", "M2", "275,50"]));

    let outcome = recovery().recover(&[RawTable { rows, page: None }]);
    assert_eq!(outcome.servicos.len(), 10);
    assert_eq!(outcome.debug.leak_cleared, 8);

    // After cleanup, fewer than 10% of items carry a leaked quantity.
    let leaked = outcome
        .servicos
        .iter()
        .filter(|s| match (&s.item, s.quantidade) {
            (Some(code), Some(qty)) => code.digits().parse::<f64>().ok() == Some(qty),
            _ => false,
        })
        .count();
    assert!(
        (leaked as f64) < outcome.servicos.len() as f64 * 0.10,
        "{} leaked of {}",
        leaked,
        outcome.servicos.len()
    );

    // The two real quantities survived.
    let with_qty: Vec<f64> = outcome
        .servicos
        .iter()
        .filter_map(|s| s.quantidade)
        .collect();
    assert_eq!(with_qty, vec![350.0, 275.5]);
}

// =============================================================================
// HEADERLESS TABLES AND ROLE INFERENCE
// =============================================================================

#[test]
fn test_headerless_table_role_inference() {
    let rows: Vec<Vec<String>> = (1..=10)
        .map(|i| {
            row(&[
                &format!("2.{}", i),
                "Fornecimento e assentamento de piso cerâmico",
                "M2",
                &format!("{},00", 200 + i),
            ])
        })
        .collect();
    let outcome = recovery().recover(&[RawTable { rows, page: None }]);

    assert_eq!(outcome.servicos.len(), 10);
    assert!(outcome.debug.tables[0].item_by_content);
    assert!(outcome.servicos.iter().all(|s| {
        s.item.is_some() && s.unidade.as_deref() == Some("M2") && s.quantidade.is_some()
    }));
}

#[test]
fn test_section_and_summary_rows_skipped() {
    let table = RawTable {
        rows: vec![
            row(&["ITEM", "DISCRIMINAÇÃO", "UNID", "QTD"]),
            row(&["1", "SERVIÇOS PRELIMINARES", "", ""]),
            row(&["1.1", "Limpeza mecanizada do terreno", "M2", "1.200,00"]),
            row(&["", "SUBTOTAL", "", "1.200,00"]),
            row(&["2", "FUNDAÇÕES", "", ""]),
            row(&["2.1", "Escavação manual de valas", "M3", "48,00"]),
            row(&["", "TOTAL GERAL", "", "99.999,99"]),
        ],
        page: Some(1),
    };
    let outcome = recovery().recover(&[table]);
    assert_eq!(outcome.servicos.len(), 2);
    assert_eq!(outcome.debug.tables[0].skipped_sections, 2);
    assert_eq!(outcome.debug.tables[0].skipped_summary, 2);
}

#[test]
fn test_unit_inferred_from_siblings() {
    let table = RawTable {
        rows: vec![
            row(&["ITEM", "DESCRIÇÃO", "UNID", "QTD"]),
            row(&["3.1", "Execução de contrapiso", "M2", "100,00"]),
            row(&["3.2", "Execução de regularização", "M2", "80,00"]),
            row(&["3.3", "Execução de camada niveladora", "", "60,00"]),
        ],
        page: None,
    };
    let outcome = recovery().recover(&[table]);
    assert_eq!(outcome.debug.units_inferred, 1);
    assert!(outcome
        .servicos
        .iter()
        .all(|s| s.unidade.as_deref() == Some("M2")));
}

#[test]
fn test_hidden_item_recovered_from_description() {
    let table = RawTable {
        rows: vec![
            row(&["ITEM", "DESCRIÇÃO", "UNID", "QTD"]),
            row(&[
                "",
                "Execução de piso industrial de alta resistência 4.2 M2 88,50",
                "",
                "",
            ]),
        ],
        page: None,
    };
    let outcome = recovery().recover(&[table]);
    assert_eq!(outcome.debug.tables[0].hidden_recovered, 1);
    let s = &outcome.servicos[0];
    assert_eq!(s.item.as_ref().unwrap().to_string(), "4.2");
    assert_eq!(s.quantidade, Some(88.5));
}
