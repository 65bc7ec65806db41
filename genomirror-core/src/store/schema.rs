/// Current schema version.
pub const SCHEMA_VERSION: &str = "1";

/// Full SQL schema for the genomirror `SQLite` database.
pub const SCHEMA_SQL: &str = r"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS mirror_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- One row per sync snapshot
CREATE TABLE IF NOT EXISTS version (
    version_id INTEGER PRIMARY KEY AUTOINCREMENT,
    dl_directory TEXT,
    version_date TEXT NOT NULL,
    used_by TEXT,
    is_current INTEGER NOT NULL DEFAULT 0
);

-- One genome assembly within one version
CREATE TABLE IF NOT EXISTS genomeproject (
    gpv_id INTEGER PRIMARY KEY AUTOINCREMENT,
    version_id INTEGER NOT NULL,
    assembly_accession TEXT NOT NULL,
    asm_name TEXT NOT NULL,
    genome_name TEXT NOT NULL,
    bioproject TEXT,
    biosample TEXT,
    taxid INTEGER,
    species_taxid INTEGER,
    org_name TEXT,
    infraspecific_name TEXT,
    submitter TEXT,
    release_date TEXT,
    gpv_directory TEXT NOT NULL,
    file_types TEXT,
    prev_gpv INTEGER,
    UNIQUE(version_id, assembly_accession, asm_name)
);
CREATE INDEX IF NOT EXISTS idx_gp_version ON genomeproject(version_id);
CREATE INDEX IF NOT EXISTS idx_gp_prev ON genomeproject(prev_gpv);

-- Chromosomes, plasmids and contigs of a genome project
CREATE TABLE IF NOT EXISTS replicon (
    rpv_id INTEGER PRIMARY KEY AUTOINCREMENT,
    gpv_id INTEGER NOT NULL REFERENCES genomeproject(gpv_id) ON DELETE CASCADE,
    version_id INTEGER NOT NULL,
    rep_accnum TEXT NOT NULL,
    definition TEXT NOT NULL,
    rep_type TEXT NOT NULL,
    rep_ginum TEXT,
    file_name TEXT NOT NULL,
    cds_num INTEGER NOT NULL DEFAULT 0,
    gene_num INTEGER NOT NULL DEFAULT 0,
    rna_num INTEGER NOT NULL DEFAULT 0,
    rep_size INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_replicon_gp ON replicon(gpv_id);

-- Remote checksums of downloaded files, used for change detection
CREATE TABLE IF NOT EXISTS genomeproject_checksum (
    version_id INTEGER NOT NULL,
    gpv_id INTEGER NOT NULL REFERENCES genomeproject(gpv_id) ON DELETE CASCADE,
    filename TEXT NOT NULL,
    checksum TEXT NOT NULL,
    PRIMARY KEY (version_id, gpv_id, filename)
);
CREATE INDEX IF NOT EXISTS idx_checksum_gp ON genomeproject_checksum(gpv_id);

-- Derived statistics, one row per genome project
CREATE TABLE IF NOT EXISTS genomeproject_meta (
    gpv_id INTEGER PRIMARY KEY REFERENCES genomeproject(gpv_id) ON DELETE CASCADE,
    gram_stain TEXT NOT NULL DEFAULT 'unknown',
    genome_gc REAL NOT NULL DEFAULT 0,
    genome_size REAL NOT NULL DEFAULT 0,
    patho_status TEXT,
    disease TEXT,
    pathogenic_in TEXT,
    oxygen_req TEXT,
    motility TEXT,
    chromosome_num INTEGER NOT NULL DEFAULT 0,
    plasmid_num INTEGER NOT NULL DEFAULT 0,
    contig_num INTEGER NOT NULL DEFAULT 0
);

-- Cached lineages from the taxonomy directory
CREATE TABLE IF NOT EXISTS taxonomy (
    taxon_id INTEGER PRIMARY KEY,
    superkingdom TEXT,
    phylum TEXT,
    tax_class TEXT,
    tax_order TEXT,
    family TEXT,
    genus TEXT,
    species TEXT,
    other TEXT,
    synonyms TEXT,
    gram_stain TEXT
);
";

/// `SQLite` PRAGMAs applied on open. WAL is skipped for in-memory stores.
pub const PRAGMAS_SQL: &str = r"
PRAGMA synchronous = NORMAL;
PRAGMA cache_size = -64000;
PRAGMA foreign_keys = ON;
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_executes_on_in_memory_sqlite() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(PRAGMAS_SQL).unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        for table in [
            "mirror_meta",
            "version",
            "genomeproject",
            "replicon",
            "genomeproject_checksum",
            "genomeproject_meta",
            "taxonomy",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn genome_natural_key_is_unique_per_version() {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(SCHEMA_SQL).unwrap();
        let insert = "INSERT INTO genomeproject
            (version_id, assembly_accession, asm_name, genome_name, gpv_directory)
            VALUES (?1, 'GCF_1.1', 'ASM1', 'E_coli', '/x')";
        conn.execute(insert, [1]).unwrap();
        conn.execute(insert, [2]).unwrap();
        assert!(conn.execute(insert, [1]).is_err());
    }
}
