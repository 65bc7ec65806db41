// Taxonomy lineages: the NCBI E-utilities client, its XML parser, and the
// store-backed cache that also guesses gram stain from the lineage.

use std::time::Duration;

use async_trait::async_trait;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use tracing::{debug, info, instrument, warn};

use crate::config::TaxonomySection;
use crate::error::{Result, TaxonomyError};
use crate::store::GenomeStore;
use crate::types::{GramStain, Taxonomy};

/// Source of taxon lineages.
#[async_trait]
pub trait TaxonomyDirectory: Send + Sync {
    /// Lineage and synonyms for `taxon_id`; `TaxonomyError::NotFound` when
    /// the directory has no such taxon.
    async fn fetch_lineage(&self, taxon_id: i64) -> Result<Taxonomy>;
}

/// NCBI E-utilities `efetch` against the taxonomy database.
#[derive(Debug, Clone)]
pub struct EutilsTaxonomy {
    client: Client,
    base_url: String,
    email: String,
    tool: String,
}

impl EutilsTaxonomy {
    pub fn new(config: &TaxonomySection) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TaxonomyError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.eutils_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            tool: config.tool.clone(),
        })
    }
}

#[async_trait]
impl TaxonomyDirectory for EutilsTaxonomy {
    async fn fetch_lineage(&self, taxon_id: i64) -> Result<Taxonomy> {
        let url = format!("{}/efetch.fcgi", self.base_url);
        let id = taxon_id.to_string();
        debug!(taxon_id, "fetching taxonomy");
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("db", "taxonomy"),
                ("id", id.as_str()),
                ("report", "xml"),
                ("mode", "text"),
                ("email", self.email.as_str()),
                ("tool", self.tool.as_str()),
            ])
            .send()
            .await
            .map_err(|e| TaxonomyError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(TaxonomyError::Network(format!("HTTP {} from {url}", resp.status())).into());
        }
        let body = resp
            .text()
            .await
            .map_err(|e| TaxonomyError::Network(e.to_string()))?;
        Ok(parse_taxon_xml(taxon_id, &body)?)
    }
}

/// Map an NCBI rank label onto a lineage column.
fn rank_slot<'a>(tax: &'a mut Taxonomy, rank: &str) -> Option<&'a mut Option<String>> {
    match rank {
        "superkingdom" | "domain" => Some(&mut tax.superkingdom),
        "phylum" => Some(&mut tax.phylum),
        "class" => Some(&mut tax.tax_class),
        "order" => Some(&mut tax.order),
        "family" => Some(&mut tax.family),
        "genus" => Some(&mut tax.genus),
        "species" => Some(&mut tax.species),
        _ => None,
    }
}

/// Parse an `efetch` taxonomy document for its first `Taxon`.
///
/// Lineage ranks come from `LineageEx/Taxon`; the taxon's own name fills
/// its rank's column, or `other` when the rank is not a lineage column.
pub fn parse_taxon_xml(taxon_id: i64, xml: &str) -> std::result::Result<Taxonomy, TaxonomyError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut found = false;
    let mut own_rank = None;
    let mut own_name = None;
    let mut lineage: Vec<(String, String)> = Vec::new();
    let mut entry: (Option<String>, Option<String>) = (None, None);
    let mut equivalents = Vec::new();
    let mut synonyms = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                // Only the first top-level Taxon is read
                if name == "Taxon" && path.len() == 1 {
                    if found {
                        break;
                    }
                    found = true;
                }
                path.push(name);
            }
            Ok(Event::End(_)) => {
                if path.len() == 4 && path[2] == "LineageEx" && path[3] == "Taxon" {
                    if let (Some(rank), Some(name)) = std::mem::take(&mut entry) {
                        lineage.push((rank, name));
                    }
                }
                path.pop();
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| TaxonomyError::Xml(e.to_string()))?
                    .into_owned();
                let tail: Vec<&str> = path.iter().skip(1).map(String::as_str).collect();
                match tail.as_slice() {
                    ["Taxon", "ScientificName"] => own_name = Some(text),
                    ["Taxon", "Rank"] => own_rank = Some(text),
                    ["Taxon", "LineageEx", "Taxon", "Rank"] => entry.0 = Some(text),
                    ["Taxon", "LineageEx", "Taxon", "ScientificName"] => entry.1 = Some(text),
                    ["Taxon", "OtherNames", "EquivalentName"] => equivalents.push(text),
                    ["Taxon", "OtherNames", "Synonym"] => synonyms.push(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(TaxonomyError::Xml(e.to_string())),
        }
    }

    if !found {
        return Err(TaxonomyError::NotFound(taxon_id));
    }

    let mut tax = Taxonomy {
        taxon_id,
        ..Default::default()
    };
    for (rank, name) in lineage {
        if let Some(slot) = rank_slot(&mut tax, &rank) {
            *slot = Some(name);
        }
    }
    if let Some(name) = own_name {
        match own_rank.as_deref().and_then(|r| rank_slot(&mut tax, r)) {
            Some(slot) => *slot = Some(name),
            None => tax.other = Some(name),
        }
    }
    equivalents.extend(synonyms);
    if !equivalents.is_empty() {
        tax.synonyms = Some(equivalents.join("; "));
    }
    Ok(tax)
}

/// Phylum names, old and current, with their usual gram reaction.
const GRAM_BY_PHYLUM: &[(&str, GramStain)] = &[
    ("Acidobacteria", GramStain::Negative),
    ("Acidobacteriota", GramStain::Negative),
    ("Actinobacteria", GramStain::Positive),
    ("Actinomycetota", GramStain::Positive),
    ("Aquificae", GramStain::Negative),
    ("Aquificota", GramStain::Negative),
    ("Bacteroidetes", GramStain::Negative),
    ("Bacteroidota", GramStain::Negative),
    ("Bacillota", GramStain::Positive),
    ("Chlamydiae", GramStain::Negative),
    ("Chlamydiota", GramStain::Negative),
    ("Chlorobi", GramStain::Negative),
    ("Chlorobiota", GramStain::Negative),
    ("Chloroflexi", GramStain::Positive),
    ("Chloroflexota", GramStain::Positive),
    ("Cyanobacteria", GramStain::Negative),
    ("Cyanobacteriota", GramStain::Negative),
    ("Deinococcus-Thermus", GramStain::Negative),
    ("Deinococcota", GramStain::Negative),
    ("Dictyoglomi", GramStain::Negative),
    ("Dictyoglomota", GramStain::Negative),
    ("Elusimicrobia", GramStain::Negative),
    ("Elusimicrobiota", GramStain::Negative),
    ("Firmicutes", GramStain::Positive),
    ("Fusobacteria", GramStain::Negative),
    ("Fusobacteriota", GramStain::Negative),
    ("Mycoplasmatota", GramStain::Negative),
    ("Nitrospirae", GramStain::Negative),
    ("Nitrospirota", GramStain::Negative),
    ("Planctomycetes", GramStain::Negative),
    ("Planctomycetota", GramStain::Negative),
    ("Proteobacteria", GramStain::Negative),
    ("Pseudomonadota", GramStain::Negative),
    ("Spirochaetes", GramStain::Negative),
    ("Spirochaetota", GramStain::Negative),
    ("Tenericutes", GramStain::Negative),
    ("Thermotogae", GramStain::Negative),
    ("Thermotogota", GramStain::Negative),
    ("Verrucomicrobia", GramStain::Negative),
    ("Verrucomicrobiota", GramStain::Negative),
];

/// First lineage name, superkingdom downwards, with a known gram reaction.
pub fn gram_from_lineage(tax: &Taxonomy) -> Option<GramStain> {
    tax.ranks().into_iter().flatten().find_map(|name| {
        GRAM_BY_PHYLUM
            .iter()
            .find(|(phylum, _)| *phylum == name)
            .map(|(_, gram)| *gram)
    })
}

/// Lazily populated taxonomy rows backed by a [`TaxonomyDirectory`].
pub struct TaxonomyCache<'a> {
    store: &'a dyn GenomeStore,
    directory: &'a dyn TaxonomyDirectory,
}

impl std::fmt::Debug for TaxonomyCache<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyCache").finish_non_exhaustive()
    }
}

impl<'a> TaxonomyCache<'a> {
    pub fn new(store: &'a dyn GenomeStore, directory: &'a dyn TaxonomyDirectory) -> Self {
        Self { store, directory }
    }

    /// The stored lineage, fetching and storing it on first use.
    #[instrument(skip(self))]
    pub async fn find_or_create(&self, taxon_id: i64) -> Result<Taxonomy> {
        if let Some(tax) = self.store.get_taxonomy(taxon_id).await? {
            return Ok(tax);
        }
        let fetched = self.directory.fetch_lineage(taxon_id).await?;
        self.store.insert_taxonomy(&fetched).await?;
        info!(taxon_id, "stored taxonomy");
        Ok(self
            .store
            .get_taxonomy(taxon_id)
            .await?
            .unwrap_or(fetched))
    }

    /// Best-effort gram stain for a taxon, remembered on its taxonomy row.
    pub async fn guess_gram(&self, taxon_id: i64) -> Result<Option<GramStain>> {
        let tax = self.find_or_create(taxon_id).await?;
        if tax.gram_stain.is_some() {
            return Ok(tax.gram_stain);
        }
        let Some(gram) = gram_from_lineage(&tax) else {
            warn!(taxon_id, "no gram stain for lineage");
            return Ok(None);
        };
        self.store.set_taxonomy_gram(taxon_id, gram).await?;
        Ok(Some(gram))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::store::SqliteStore;

    const ECOLI: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE TaxaSet PUBLIC "-//NLM//DTD Taxon, 14th January 2002//EN" "https://www.ncbi.nlm.nih.gov/entrez/query/DTD/taxon.dtd">
<TaxaSet><Taxon>
    <TaxId>562</TaxId>
    <ScientificName>Escherichia coli</ScientificName>
    <OtherNames>
        <EquivalentName>Bacterium coli commune</EquivalentName>
        <Synonym>Bacillus coli</Synonym>
        <Synonym>Bacterium coli</Synonym>
    </OtherNames>
    <ParentTaxId>561</ParentTaxId>
    <Rank>species</Rank>
    <LineageEx>
        <Taxon><TaxId>131567</TaxId><ScientificName>cellular organisms</ScientificName><Rank>no rank</Rank></Taxon>
        <Taxon><TaxId>2</TaxId><ScientificName>Bacteria</ScientificName><Rank>domain</Rank></Taxon>
        <Taxon><TaxId>1224</TaxId><ScientificName>Pseudomonadota</ScientificName><Rank>phylum</Rank></Taxon>
        <Taxon><TaxId>1236</TaxId><ScientificName>Gammaproteobacteria</ScientificName><Rank>class</Rank></Taxon>
        <Taxon><TaxId>91347</TaxId><ScientificName>Enterobacterales</ScientificName><Rank>order</Rank></Taxon>
        <Taxon><TaxId>543</TaxId><ScientificName>Enterobacteriaceae</ScientificName><Rank>family</Rank></Taxon>
        <Taxon><TaxId>561</TaxId><ScientificName>Escherichia</ScientificName><Rank>genus</Rank></Taxon>
    </LineageEx>
</Taxon>
</TaxaSet>"#;

    #[test]
    fn parses_lineage_and_synonyms() {
        let tax = parse_taxon_xml(562, ECOLI).unwrap();
        assert_eq!(tax.superkingdom.as_deref(), Some("Bacteria"));
        assert_eq!(tax.phylum.as_deref(), Some("Pseudomonadota"));
        assert_eq!(tax.tax_class.as_deref(), Some("Gammaproteobacteria"));
        assert_eq!(tax.order.as_deref(), Some("Enterobacterales"));
        assert_eq!(tax.family.as_deref(), Some("Enterobacteriaceae"));
        assert_eq!(tax.genus.as_deref(), Some("Escherichia"));
        assert_eq!(tax.species.as_deref(), Some("Escherichia coli"));
        assert_eq!(tax.other, None);
        assert_eq!(
            tax.synonyms.as_deref(),
            Some("Bacterium coli commune; Bacillus coli; Bacterium coli")
        );
        assert_eq!(gram_from_lineage(&tax), Some(GramStain::Negative));
    }

    #[test]
    fn no_rank_taxon_goes_to_other() {
        let xml = "<TaxaSet><Taxon><ScientificName>Escherichia coli K-12</ScientificName>\
                   <Rank>no rank</Rank></Taxon></TaxaSet>";
        let tax = parse_taxon_xml(83333, xml).unwrap();
        assert_eq!(tax.other.as_deref(), Some("Escherichia coli K-12"));
        assert_eq!(tax.synonyms, None);
    }

    #[test]
    fn missing_taxon_is_not_found() {
        let xml = "<eFetchResult><ERROR>ID list is empty!</ERROR></eFetchResult>";
        assert!(matches!(
            parse_taxon_xml(0, xml),
            Err(TaxonomyError::NotFound(0))
        ));
        assert!(matches!(
            parse_taxon_xml(1, "<TaxaSet><Taxon></Wrong></TaxaSet>"),
            Err(TaxonomyError::Xml(_))
        ));
    }

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TaxonomyDirectory for Counting {
        async fn fetch_lineage(&self, taxon_id: i64) -> Result<Taxonomy> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if taxon_id == 1423 {
                Ok(Taxonomy {
                    taxon_id,
                    superkingdom: Some("Bacteria".into()),
                    phylum: Some("Bacillota".into()),
                    species: Some("Bacillus subtilis".into()),
                    ..Default::default()
                })
            } else {
                Err(TaxonomyError::NotFound(taxon_id).into())
            }
        }
    }

    #[tokio::test]
    async fn cache_fetches_once_and_remembers_gram() {
        let store = SqliteStore::in_memory().unwrap();
        let directory = Counting {
            calls: AtomicUsize::new(0),
        };
        let cache = TaxonomyCache::new(&store, &directory);
        assert!(format!("{cache:?}").starts_with("TaxonomyCache"));

        assert_eq!(cache.guess_gram(1423).await.unwrap(), Some(GramStain::Positive));
        assert_eq!(cache.guess_gram(1423).await.unwrap(), Some(GramStain::Positive));
        assert_eq!(directory.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            store.get_taxonomy(1423).await.unwrap().unwrap().gram_stain,
            Some(GramStain::Positive)
        );

        let err = cache.find_or_create(9).await.unwrap_err();
        assert!(err.is_not_found());
    }
}
