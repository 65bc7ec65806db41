use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{Result, StoreError};
use crate::types::{
    GenomeChecksum, GenomeFields, GenomeMeta, GenomeProject, GpvId, GramStain, NewGenomeProject,
    Replicon, RepliconFields, RpvId, StoreStats, Taxonomy, Version, VersionId,
};

use super::GenomeStore;
use super::schema;

const DATE_FORMAT: &str = "%Y-%m-%d";

const GP_COLUMNS: &str = "gpv_id, version_id, assembly_accession, asm_name, genome_name,
    bioproject, biosample, taxid, species_taxid, org_name, infraspecific_name, submitter,
    release_date, gpv_directory, file_types, prev_gpv";

const REPLICON_COLUMNS: &str = "rpv_id, gpv_id, version_id, rep_accnum, definition, rep_type,
    rep_ginum, file_name, cds_num, gene_num, rna_num, rep_size";

/// SQLite-backed implementation of `GenomeStore`.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StoreError::Sqlite)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.lock();

        conn.execute_batch(schema::PRAGMAS_SQL)
            .map_err(|e| StoreError::Migration(format!("pragmas: {e}")))?;
        // Ignored for in-memory databases
        let _ = conn.execute_batch("PRAGMA journal_mode = WAL;");

        conn.execute_batch(schema::SCHEMA_SQL)
            .map_err(|e| StoreError::Migration(format!("schema: {e}")))?;

        conn.execute(
            "INSERT OR IGNORE INTO mirror_meta (key, value) VALUES ('schema_version', ?1)",
            params![schema::SCHEMA_VERSION],
        )
        .map_err(StoreError::Sqlite)?;

        let found: String = conn
            .query_row(
                "SELECT value FROM mirror_meta WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        if found != schema::SCHEMA_VERSION {
            return Err(StoreError::Migration(format!(
                "database schema version {found}, expected {}",
                schema::SCHEMA_VERSION
            ))
            .into());
        }

        Ok(())
    }

    // ── Row mapping ────────────────────────────────────────────────

    fn row_to_version(row: &rusqlite::Row<'_>) -> rusqlite::Result<Version> {
        let dir: Option<String> = row.get("dl_directory")?;
        let date: String = row.get("version_date")?;
        Ok(Version {
            id: VersionId(row.get("version_id")?),
            dl_directory: dir.map(PathBuf::from),
            version_date: parse_date(2, &date)?,
            is_current: row.get("is_current")?,
            used_by: row.get("used_by")?,
        })
    }

    fn row_to_genome(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenomeProject> {
        let release_date: Option<String> = row.get("release_date")?;
        let dir: String = row.get("gpv_directory")?;
        let prev: Option<i64> = row.get("prev_gpv")?;
        Ok(GenomeProject {
            id: GpvId(row.get("gpv_id")?),
            version_id: VersionId(row.get("version_id")?),
            gpv_directory: PathBuf::from(dir),
            prev_gpv: prev.map(GpvId),
            fields: GenomeFields {
                assembly_accession: row.get("assembly_accession")?,
                asm_name: row.get("asm_name")?,
                genome_name: row.get("genome_name")?,
                bioproject: row.get("bioproject")?,
                biosample: row.get("biosample")?,
                taxid: row.get("taxid")?,
                species_taxid: row.get("species_taxid")?,
                org_name: row.get("org_name")?,
                infraspecific_name: row.get("infraspecific_name")?,
                submitter: row.get("submitter")?,
                release_date: release_date
                    .as_deref()
                    .map(|d| parse_date(12, d))
                    .transpose()?,
                file_types: row.get("file_types")?,
            },
        })
    }

    fn row_to_replicon(row: &rusqlite::Row<'_>) -> rusqlite::Result<Replicon> {
        let rep_type: String = row.get("rep_type")?;
        Ok(Replicon {
            id: RpvId(row.get("rpv_id")?),
            gpv_id: GpvId(row.get("gpv_id")?),
            version_id: VersionId(row.get("version_id")?),
            fields: RepliconFields {
                rep_accnum: row.get("rep_accnum")?,
                definition: row.get("definition")?,
                rep_type: rep_type.parse().map_err(|e: String| text_error(5, e))?,
                rep_ginum: row.get("rep_ginum")?,
                file_name: row.get("file_name")?,
                cds_num: row.get("cds_num")?,
                gene_num: row.get("gene_num")?,
                rna_num: row.get("rna_num")?,
                rep_size: row.get("rep_size")?,
            },
        })
    }

    fn row_to_meta(row: &rusqlite::Row<'_>) -> rusqlite::Result<GenomeMeta> {
        let gram: String = row.get("gram_stain")?;
        Ok(GenomeMeta {
            gpv_id: GpvId(row.get("gpv_id")?),
            gram_stain: gram.parse().map_err(|e: String| text_error(1, e))?,
            genome_gc: row.get("genome_gc")?,
            genome_size: row.get("genome_size")?,
            patho_status: row.get("patho_status")?,
            disease: row.get("disease")?,
            pathogenic_in: row.get("pathogenic_in")?,
            oxygen_req: row.get("oxygen_req")?,
            motility: row.get("motility")?,
            chromosome_num: row.get("chromosome_num")?,
            plasmid_num: row.get("plasmid_num")?,
            contig_num: row.get("contig_num")?,
        })
    }

    fn row_to_taxonomy(row: &rusqlite::Row<'_>) -> rusqlite::Result<Taxonomy> {
        let gram: Option<String> = row.get("gram_stain")?;
        Ok(Taxonomy {
            taxon_id: row.get("taxon_id")?,
            superkingdom: row.get("superkingdom")?,
            phylum: row.get("phylum")?,
            tax_class: row.get("tax_class")?,
            order: row.get("tax_order")?,
            family: row.get("family")?,
            genus: row.get("genus")?,
            species: row.get("species")?,
            other: row.get("other")?,
            synonyms: row.get("synonyms")?,
            gram_stain: gram
                .map(|g| g.parse().map_err(|e: String| text_error(10, e)))
                .transpose()?,
        })
    }
}

fn text_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parse_date(idx: usize, s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| text_error(idx, e))
}

fn path_text(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait::async_trait]
impl GenomeStore for SqliteStore {
    // ── Transactions ───────────────────────────────────────────────

    async fn begin_transaction(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch("SAVEPOINT genomirror_tx")
            .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch("RELEASE genomirror_tx")
            .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn rollback_transaction(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch("ROLLBACK TO genomirror_tx; RELEASE genomirror_tx")
            .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Versions ───────────────────────────────────────────────────

    async fn insert_version(&self, date: NaiveDate) -> Result<VersionId> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO version (version_date, is_current) VALUES (?1, 0)",
            params![date.format(DATE_FORMAT).to_string()],
        )
        .map_err(|e| StoreError::from_insert("version", e))?;
        Ok(VersionId(conn.last_insert_rowid()))
    }

    async fn set_version_directory(&self, id: VersionId, dir: &Path) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE version SET dl_directory = ?1 WHERE version_id = ?2",
            params![path_text(dir), id.0],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn get_version(&self, id: VersionId) -> Result<Option<Version>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM version WHERE version_id = ?1",
            params![id.0],
            Self::row_to_version,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    async fn latest_version_id(&self) -> Result<Option<VersionId>> {
        let conn = self.lock();
        let id: Option<i64> = conn
            .query_row("SELECT MAX(version_id) FROM version", [], |row| row.get(0))
            .map_err(StoreError::Sqlite)?;
        Ok(id.map(VersionId))
    }

    async fn current_version_id(&self) -> Result<Option<VersionId>> {
        let conn = self.lock();
        let id: Option<i64> = conn
            .query_row(
                "SELECT version_id FROM version WHERE is_current = 1
                 ORDER BY version_id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(id.map(VersionId))
    }

    async fn list_versions(&self) -> Result<Vec<Version>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT * FROM version ORDER BY version_id")
            .map_err(StoreError::Sqlite)?;
        let versions = stmt
            .query_map([], Self::row_to_version)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(versions)
    }

    async fn mark_current(&self, id: VersionId) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE version SET is_current = (version_id = ?1)",
            params![id.0],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn delete_version(&self, id: VersionId) -> Result<bool> {
        let conn = self.lock();
        let n = conn
            .execute("DELETE FROM version WHERE version_id = ?1", params![id.0])
            .map_err(StoreError::Sqlite)?;
        Ok(n > 0)
    }

    // ── Genome projects ────────────────────────────────────────────

    async fn insert_genome(&self, gp: &NewGenomeProject) -> Result<GenomeProject> {
        let conn = self.lock();
        let f = &gp.fields;
        conn.execute(
            "INSERT INTO genomeproject (version_id, assembly_accession, asm_name, genome_name,
                bioproject, biosample, taxid, species_taxid, org_name, infraspecific_name,
                submitter, release_date, gpv_directory, file_types, prev_gpv)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                gp.version_id.0,
                f.assembly_accession,
                f.asm_name,
                f.genome_name,
                f.bioproject,
                f.biosample,
                f.taxid,
                f.species_taxid,
                f.org_name,
                f.infraspecific_name,
                f.submitter,
                f.release_date.map(|d| d.format(DATE_FORMAT).to_string()),
                path_text(&gp.gpv_directory),
                f.file_types,
                gp.prev_gpv.map(|p| p.0),
            ],
        )
        .map_err(|e| {
            StoreError::from_insert(
                &format!(
                    "genomeproject {} {} in version {}",
                    f.assembly_accession, f.asm_name, gp.version_id
                ),
                e,
            )
        })?;

        Ok(GenomeProject {
            id: GpvId(conn.last_insert_rowid()),
            version_id: gp.version_id,
            gpv_directory: gp.gpv_directory.clone(),
            prev_gpv: gp.prev_gpv,
            fields: gp.fields.clone(),
        })
    }

    async fn get_genome(&self, id: GpvId) -> Result<Option<GenomeProject>> {
        let conn = self.lock();
        conn.query_row(
            &format!("SELECT {GP_COLUMNS} FROM genomeproject WHERE gpv_id = ?1"),
            params![id.0],
            Self::row_to_genome,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    async fn find_genome(
        &self,
        assembly_accession: &str,
        asm_name: &str,
        version: VersionId,
    ) -> Result<Option<GenomeProject>> {
        let conn = self.lock();
        conn.query_row(
            &format!(
                "SELECT {GP_COLUMNS} FROM genomeproject
                 WHERE assembly_accession = ?1 AND asm_name = ?2 AND version_id = ?3"
            ),
            params![assembly_accession, asm_name, version.0],
            Self::row_to_genome,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    async fn list_genomes(&self, version: Option<VersionId>) -> Result<Vec<GenomeProject>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GP_COLUMNS} FROM genomeproject
                 WHERE ?1 IS NULL OR version_id = ?1 ORDER BY gpv_id"
            ))
            .map_err(StoreError::Sqlite)?;
        let genomes = stmt
            .query_map(params![version.map(|v| v.0)], Self::row_to_genome)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(genomes)
    }

    async fn count_genomes(&self, version: VersionId) -> Result<u64> {
        let conn = self.lock();
        let n: u64 = conn
            .query_row(
                "SELECT COUNT(*) FROM genomeproject WHERE version_id = ?1",
                params![version.0],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        Ok(n)
    }

    async fn dependents_of(&self, root: GpvId) -> Result<Vec<GenomeProject>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {GP_COLUMNS} FROM genomeproject WHERE prev_gpv = ?1 ORDER BY gpv_id"
            ))
            .map_err(StoreError::Sqlite)?;
        let genomes = stmt
            .query_map(params![root.0], Self::row_to_genome)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(genomes)
    }

    async fn set_prev_gpv(&self, id: GpvId, prev: Option<GpvId>) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE genomeproject SET prev_gpv = ?1 WHERE gpv_id = ?2",
            params![prev.map(|p| p.0), id.0],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn set_file_types(&self, id: GpvId, file_types: Option<&str>) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE genomeproject SET file_types = ?1 WHERE gpv_id = ?2",
            params![file_types, id.0],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn delete_genome(&self, id: GpvId) -> Result<bool> {
        let conn = self.lock();
        let n = conn
            .execute("DELETE FROM genomeproject WHERE gpv_id = ?1", params![id.0])
            .map_err(StoreError::Sqlite)?;
        Ok(n > 0)
    }

    // ── Replicons ──────────────────────────────────────────────────

    async fn insert_replicon(
        &self,
        gpv_id: GpvId,
        version_id: VersionId,
        fields: &RepliconFields,
    ) -> Result<RpvId> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO replicon (gpv_id, version_id, rep_accnum, definition, rep_type,
                rep_ginum, file_name, cds_num, gene_num, rna_num, rep_size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                gpv_id.0,
                version_id.0,
                fields.rep_accnum,
                fields.definition,
                fields.rep_type.as_str(),
                fields.rep_ginum,
                fields.file_name,
                fields.cds_num,
                fields.gene_num,
                fields.rna_num,
                fields.rep_size,
            ],
        )
        .map_err(|e| StoreError::from_insert(&format!("replicon {}", fields.rep_accnum), e))?;
        Ok(RpvId(conn.last_insert_rowid()))
    }

    async fn replicons_for_genome(&self, gpv_id: GpvId) -> Result<Vec<Replicon>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {REPLICON_COLUMNS} FROM replicon WHERE gpv_id = ?1 ORDER BY rpv_id"
            ))
            .map_err(StoreError::Sqlite)?;
        let replicons = stmt
            .query_map(params![gpv_id.0], Self::row_to_replicon)
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(replicons)
    }

    async fn delete_replicons(&self, gpv_id: GpvId) -> Result<u64> {
        let conn = self.lock();
        let n = conn
            .execute("DELETE FROM replicon WHERE gpv_id = ?1", params![gpv_id.0])
            .map_err(StoreError::Sqlite)?;
        Ok(n as u64)
    }

    // ── Checksums ──────────────────────────────────────────────────

    async fn insert_checksum(&self, checksum: &GenomeChecksum) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO genomeproject_checksum (version_id, gpv_id, filename, checksum)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                checksum.version_id.0,
                checksum.gpv_id.0,
                checksum.filename,
                checksum.checksum,
            ],
        )
        .map_err(|e| StoreError::from_insert(&format!("checksum {}", checksum.filename), e))?;
        Ok(())
    }

    async fn checksums_for_genome(&self, gpv_id: GpvId) -> Result<Vec<GenomeChecksum>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare(
                "SELECT version_id, gpv_id, filename, checksum FROM genomeproject_checksum
                 WHERE gpv_id = ?1 ORDER BY filename",
            )
            .map_err(StoreError::Sqlite)?;
        let checksums = stmt
            .query_map(params![gpv_id.0], |row| {
                Ok(GenomeChecksum {
                    version_id: VersionId(row.get(0)?),
                    gpv_id: GpvId(row.get(1)?),
                    filename: row.get(2)?,
                    checksum: row.get(3)?,
                })
            })
            .map_err(StoreError::Sqlite)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(StoreError::Sqlite)?;
        Ok(checksums)
    }

    async fn delete_checksums(&self, gpv_id: GpvId) -> Result<u64> {
        let conn = self.lock();
        let n = conn
            .execute(
                "DELETE FROM genomeproject_checksum WHERE gpv_id = ?1",
                params![gpv_id.0],
            )
            .map_err(StoreError::Sqlite)?;
        Ok(n as u64)
    }

    // ── Genome metadata ────────────────────────────────────────────

    async fn get_meta(&self, gpv_id: GpvId) -> Result<Option<GenomeMeta>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM genomeproject_meta WHERE gpv_id = ?1",
            params![gpv_id.0],
            Self::row_to_meta,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    async fn put_meta(&self, meta: &GenomeMeta) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO genomeproject_meta (gpv_id, gram_stain, genome_gc,
                genome_size, patho_status, disease, pathogenic_in, oxygen_req, motility,
                chromosome_num, plasmid_num, contig_num)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                meta.gpv_id.0,
                meta.gram_stain.as_str(),
                meta.genome_gc,
                meta.genome_size,
                meta.patho_status,
                meta.disease,
                meta.pathogenic_in,
                meta.oxygen_req,
                meta.motility,
                meta.chromosome_num,
                meta.plasmid_num,
                meta.contig_num,
            ],
        )
        .map_err(|e| StoreError::from_insert(&format!("meta for gpv_id {}", meta.gpv_id), e))?;
        Ok(())
    }

    async fn delete_meta(&self, gpv_id: GpvId) -> Result<bool> {
        let conn = self.lock();
        let n = conn
            .execute(
                "DELETE FROM genomeproject_meta WHERE gpv_id = ?1",
                params![gpv_id.0],
            )
            .map_err(StoreError::Sqlite)?;
        Ok(n > 0)
    }

    // ── Taxonomy ───────────────────────────────────────────────────

    async fn get_taxonomy(&self, taxon_id: i64) -> Result<Option<Taxonomy>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT * FROM taxonomy WHERE taxon_id = ?1",
            params![taxon_id],
            Self::row_to_taxonomy,
        )
        .optional()
        .map_err(|e| StoreError::Sqlite(e).into())
    }

    async fn insert_taxonomy(&self, taxonomy: &Taxonomy) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR IGNORE INTO taxonomy (taxon_id, superkingdom, phylum, tax_class,
                tax_order, family, genus, species, other, synonyms, gram_stain)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                taxonomy.taxon_id,
                taxonomy.superkingdom,
                taxonomy.phylum,
                taxonomy.tax_class,
                taxonomy.order,
                taxonomy.family,
                taxonomy.genus,
                taxonomy.species,
                taxonomy.other,
                taxonomy.synonyms,
                taxonomy.gram_stain.map(GramStain::as_str),
            ],
        )
        .map_err(|e| StoreError::from_insert(&format!("taxonomy {}", taxonomy.taxon_id), e))?;
        Ok(())
    }

    async fn set_taxonomy_gram(&self, taxon_id: i64, gram: GramStain) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "UPDATE taxonomy SET gram_stain = ?1 WHERE taxon_id = ?2",
            params![gram.as_str(), taxon_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    // ── Stats ──────────────────────────────────────────────────────

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock();
        let count = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get(0))
                .map_err(|e| StoreError::Sqlite(e).into())
        };

        let db_size_bytes = self
            .db_path
            .as_ref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map_or(0, |m| m.len());

        Ok(StoreStats {
            versions: count("SELECT COUNT(*) FROM version")?,
            genome_projects: count("SELECT COUNT(*) FROM genomeproject")?,
            root_genome_projects: count(
                "SELECT COUNT(*) FROM genomeproject WHERE prev_gpv IS NULL",
            )?,
            replicons: count("SELECT COUNT(*) FROM replicon")?,
            checksums: count("SELECT COUNT(*) FROM genomeproject_checksum")?,
            taxa: count("SELECT COUNT(*) FROM taxonomy")?,
            db_size_bytes,
        })
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(30))]

        /// However many times current is moved, exactly one version holds the flag.
        #[test]
        fn exactly_one_current(n in 1usize..6, picks in proptest::collection::vec(0usize..6, 1..10)) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let store = SqliteStore::in_memory().unwrap();
                let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
                let mut ids = Vec::new();
                for _ in 0..n {
                    ids.push(store.insert_version(date).await.unwrap());
                }
                for pick in picks {
                    let target = ids[pick % n];
                    store.mark_current(target).await.unwrap();
                    let current: Vec<VersionId> = store
                        .list_versions()
                        .await
                        .unwrap()
                        .into_iter()
                        .filter(|v| v.is_current)
                        .map(|v| v.id)
                        .collect();
                    prop_assert_eq!(current, vec![target]);
                }
                Ok::<(), TestCaseError>(())
            })?;
        }
    }
}
