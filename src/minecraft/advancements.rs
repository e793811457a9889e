//! The vanilla advancements, and a player's progress on them

use fuzzy_matcher::{skim::SkimMatcherV2, FuzzyMatcher};
use once_cell::sync::Lazy;
use serde_json::Value;
use sorted_vec::SortedSet;
use strum::{Display, EnumIter, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Story,
    Nether,
    End,
    Adventure,
    Husbandry,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Advancement {
    pub category: Category,
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

impl Advancement {
    /// `story/mine_stone`
    pub fn key(&self) -> String {
        format!("{}/{}", self.category, self.id)
    }
}

macro_rules! advancements {
    ($($category:ident / $id:literal : $name:literal => $description:literal,)*) => {
        pub static ADVANCEMENTS: &[Advancement] = &[
            $(Advancement {
                category: Category::$category,
                id: $id,
                name: $name,
                description: $description,
            },)*
        ];
    };
}

advancements! {
    Story / "root": "Minecraft" => "The heart and story of the game",
    Story / "mine_stone": "Stone Age" => "Mine Stone with your new Pickaxe",
    Story / "upgrade_tools": "Getting an Upgrade" => "Construct a better Pickaxe",
    Story / "smelt_iron": "Acquire Hardware" => "Smelt an Iron Ingot",
    Story / "obtain_armor": "Suit Up" => "Protect yourself with a piece of iron armor",
    Story / "lava_bucket": "Hot Stuff" => "Fill a Bucket with lava",
    Story / "iron_tools": "Isn't It Iron Pick" => "Upgrade your Pickaxe",
    Story / "deflect_arrow": "Not Today, Thank You" => "Deflect a projectile with a Shield",
    Story / "form_obsidian": "Ice Bucket Challenge" => "Obtain a block of Obsidian",
    Story / "mine_diamond": "Diamonds!" => "Acquire diamonds",
    Story / "enter_the_nether": "We Need to Go Deeper" => "Build, light and enter a Nether Portal",
    Story / "shiny_gear": "Cover Me with Diamonds" => "Diamond armor saves lives",
    Story / "enchant_item": "Enchanter" => "Enchant an item at an Enchanting Table",
    Story / "cure_zombie_villager": "Zombie Doctor" => "Weaken and then cure a Zombie Villager",
    Story / "follow_ender_eye": "Eye Spy" => "Follow an Eye of Ender",
    Story / "enter_the_end": "The End?" => "Enter the End Portal",
    Nether / "root": "Nether" => "Bring summer clothes",
    Nether / "return_to_sender": "Return to Sender" => "Destroy a Ghast with a fireball",
    Nether / "find_bastion": "Those Were the Days" => "Enter a Bastion Remnant",
    Nether / "obtain_ancient_debris": "Hidden in the Depths" => "Obtain Ancient Debris",
    Nether / "fast_travel": "Subspace Bubble" => "Use the Nether to travel 7 km in the Overworld",
    Nether / "find_fortress": "A Terrible Fortress" => "Break your way into a Nether Fortress",
    Nether / "obtain_crying_obsidian": "Who is Cutting Onions?" => "Obtain Crying Obsidian",
    Nether / "distract_piglin": "Oh Shiny" => "Distract Piglins with gold",
    Nether / "ride_strider": "This Boat Has Legs" => "Ride a Strider with a Warped Fungus on a Stick",
    Nether / "uneasy_alliance": "Uneasy Alliance" => "Rescue a Ghast from the Nether, bring it safely home to the Overworld... and then kill it",
    Nether / "loot_bastion": "War Pigs" => "Loot a Chest in a Bastion Remnant",
    Nether / "use_lodestone": "Country Lode, Take Me Home" => "Use a Compass on a Lodestone",
    Nether / "netherite_armor": "Cover Me in Debris" => "Get a full suit of Netherite armor",
    Nether / "get_wither_skull": "Spooky Scary Skeleton" => "Obtain a Wither Skeleton's skull",
    Nether / "obtain_blaze_rod": "Into Fire" => "Relieve a Blaze of its rod",
    Nether / "charge_respawn_anchor": "Not Quite \"Nine\" Lives" => "Charge a Respawn Anchor to the maximum",
    Nether / "ride_strider_in_overworld_lava": "Feels Like Home" => "Take a Strider for a loooong ride on a lava lake in the Overworld",
    Nether / "explore_nether": "Hot Tourist Destinations" => "Explore all Nether biomes",
    Nether / "summon_wither": "Withering Heights" => "Summon the Wither",
    Nether / "brew_potion": "Local Brewery" => "Brew a Potion",
    Nether / "create_beacon": "Bring Home the Beacon" => "Construct and place a Beacon",
    Nether / "all_potions": "A Furious Cocktail" => "Have every potion effect applied at the same time",
    Nether / "create_full_beacon": "Beaconator" => "Bring a Beacon to full power",
    Nether / "all_effects": "How Did We Get Here?" => "Have every effect applied at the same time",
    End / "root": "The End" => "Or the beginning?",
    End / "kill_dragon": "Free the End" => "Good luck",
    End / "dragon_egg": "The Next Generation" => "Hold the Dragon Egg",
    End / "enter_end_gateway": "Remote Getaway" => "Escape the island",
    End / "respawn_dragon": "The End... Again..." => "Respawn the Ender Dragon",
    End / "dragon_breath": "You Need a Mint" => "Collect Dragon's Breath in a Glass Bottle",
    End / "find_end_city": "The City at the End of the Game" => "Go on in, what could happen?",
    End / "elytra": "Sky's the Limit" => "Find Elytra",
    End / "levitate": "Great View From Up Here" => "Levitate up 50 blocks from the attacks of a Shulker",
    Adventure / "root": "Adventure" => "Adventure, exploration and combat",
    Adventure / "voluntary_exile": "Voluntary Exile" => "Kill a raid captain. Maybe consider staying away from villages for the time being...",
    Adventure / "spyglass_at_parrot": "Is It a Bird?" => "Look at a Parrot through a Spyglass",
    Adventure / "kill_a_mob": "Monster Hunter" => "Kill any hostile monster",
    Adventure / "trade": "What a Deal!" => "Successfully trade with a Villager",
    Adventure / "honey_block_slide": "Sticky Situation" => "Jump into a Honey Block to break your fall",
    Adventure / "ol_betsy": "Ol' Betsy" => "Shoot a Crossbow",
    Adventure / "lightning_rod_with_villager_no_fire": "Surge Protector" => "Protect a Villager from an undesired shock without starting a fire",
    Adventure / "fall_from_world_height": "Caves & Cliffs" => "Free fall from the top of the world (build limit) to the bottom of the world and survive",
    Adventure / "avoid_vibration": "Sneak 100" => "Sneak near a Sculk Sensor or Warden to prevent it from detecting you",
    Adventure / "sleep_in_bed": "Sweet Dreams" => "Sleep in a Bed to change your respawn point",
    Adventure / "hero_of_the_village": "Hero of the Village" => "Successfully defend a village from a raid",
    Adventure / "spyglass_at_ghast": "Is It a Balloon?" => "Look at a Ghast through a Spyglass",
    Adventure / "throw_trident": "A Throwaway Joke" => "Throw a Trident at something.\nNote: Throwing away your only weapon is not a good idea.",
    Adventure / "kill_mob_near_sculk_catalyst": "It Spreads" => "Kill a mob near a Sculk Catalyst",
    Adventure / "shoot_arrow": "Take Aim" => "Shoot something with an Arrow",
    Adventure / "kill_all_mobs": "Monsters Hunted" => "Kill one of every hostile monster",
    Adventure / "totem_of_undying": "Postmortal" => "Use a Totem of Undying to cheat death",
    Adventure / "summon_iron_golem": "Hired Help" => "Summon an Iron Golem to help defend a village",
    Adventure / "trade_at_world_height": "Star Trader" => "Trade with a Villager at the build height limit",
    Adventure / "two_birds_one_arrow": "Two Birds, One Arrow" => "Kill two Phantoms with a piercing Arrow",
    Adventure / "whos_the_pillager_now": "Who's the Pillager Now?" => "Give a Pillager a taste of their own medicine",
    Adventure / "arbalistic": "Arbalistic" => "Kill five unique mobs with one crossbow shot",
    Adventure / "adventuring_time": "Adventuring Time" => "Discover every biome",
    Adventure / "play_jukebox_in_meadows": "Sound of Music" => "Make the Meadows come alive with the sound of music from a Jukebox",
    Adventure / "walk_on_powder_snow_with_leather_boots": "Light as a Rabbit" => "Walk on Powder Snow... without sinking in it",
    Adventure / "spyglass_at_dragon": "Is It a Plane?" => "Look at the Ender Dragon through a Spyglass",
    Adventure / "very_very_frightening": "Very Very Frightening" => "Strike a Villager with lightning",
    Adventure / "sniper_duel": "Sniper Duel" => "Kill a Skeleton from at least 50 meters away",
    Adventure / "bullseye": "Bullseye" => "Hit the bullseye of a Target block from at least 30 meters away",
    Husbandry / "root": "Husbandry" => "The world is full of friends and food",
    Husbandry / "safely_harvest_honey": "Bee Our Guest" => "Use a Campfire to collect Honey from a Beehive using a Bottle without aggravating the bees",
    Husbandry / "breed_an_animal": "The Parrots and the Bats" => "Breed two animals together",
    Husbandry / "allay_deliver_item_to_player": "You've Got a Friend in Me" => "Have an Allay deliver items to you",
    Husbandry / "ride_a_boat_with_a_goat": "Whatever Floats Your Goat!" => "Get in a Boat and float with a Goat",
    Husbandry / "tame_an_animal": "Best Friends Forever" => "Tame an animal",
    Husbandry / "make_a_sign_glow": "Glow and Behold!" => "Make the text of any kind of sign glow",
    Husbandry / "fishy_business": "Fishy Business" => "Catch a fish",
    Husbandry / "silk_touch_nest": "Total Beelocation" => "Move a Bee Nest, with 3 Bees inside, using Silk Touch",
    Husbandry / "tadpole_in_a_bucket": "Bukkit Bukkit" => "Catch a Tadpole in a Bucket",
    Husbandry / "plant_seed": "A Seedy Place" => "Plant a seed and watch it grow",
    Husbandry / "wax_on": "Wax On" => "Apply Honeycomb to a Copper block!",
    Husbandry / "bred_all_animals": "Two by Two" => "Breed all the animals!",
    Husbandry / "allay_deliver_cake_to_note_block": "Birthday Song" => "Have an Allay drop a Cake at a Note Block",
    Husbandry / "complete_catalogue": "A Complete Catalogue" => "Tame all Cat variants!",
    Husbandry / "tactical_fishing": "Tactical Fishing" => "Catch a Fish... without a Fishing Rod!",
    Husbandry / "leash_all_frog_variants": "When the Squad Hops into Town" => "Get each Frog variant on a Lead",
    Husbandry / "balanced_diet": "A Balanced Diet" => "Eat everything that is edible, even if it's not good for you",
    Husbandry / "obtain_netherite_hoe": "Serious Dedication" => "Use a Netherite Ingot to upgrade a Hoe, and then reevaluate your life choices",
    Husbandry / "wax_off": "Wax Off" => "Scrape Wax off of a Copper block!",
    Husbandry / "axolotl_in_a_bucket": "The Cutest Predator" => "Catch an Axolotl in a Bucket",
    Husbandry / "froglights": "With Our Powers Combined!" => "Have all Froglights in your inventory",
    Husbandry / "kill_axolotl_target": "The Healing Power of Friendship!" => "Team up with an Axolotl and win a fight",
}

/// The advancement `category/id`
pub fn find(category: &str, id: &str) -> Option<&'static Advancement> {
    ADVANCEMENTS
        .iter()
        .find(|advancement| advancement.category.to_string() == category && advancement.id == id)
}

/// Parses the message the plugin sends for a completed advancement,
/// `minecraft:story/mine_stone`. Recipes are `None`.
pub fn from_key(key: &str) -> Option<(&str, &str)> {
    let key = key.strip_prefix("minecraft:").unwrap_or(key);

    if key.starts_with("recipes") {
        return None;
    }

    key.split_once('/')
}

static MATCHER: Lazy<SkimMatcherV2> = Lazy::new(|| SkimMatcherV2::default().ignore_case());

#[derive(Eq)]
struct MatcherResult(&'static Advancement, i64);

impl PartialEq for MatcherResult {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == std::cmp::Ordering::Equal
    }
}

impl PartialOrd for MatcherResult {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MatcherResult {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .1
            .cmp(&self.1)
            .then_with(|| self.0.name.cmp(other.0.name))
            .then_with(|| self.0.id.cmp(other.0.id))
    }
}

/// Advancements whose name or id match `query`, best match first
pub fn search(query: &str) -> Vec<&'static Advancement> {
    let query = query.trim();
    if query.is_empty() {
        return ADVANCEMENTS.iter().collect();
    }

    let mut matches = SortedSet::with_capacity(ADVANCEMENTS.len());

    for advancement in ADVANCEMENTS {
        let score = [advancement.name, advancement.id]
            .into_iter()
            .filter_map(|candidate| MATCHER.fuzzy_match(candidate, query))
            .max();

        if let Some(score) = score.filter(|score| *score > 0) {
            matches.push(MatcherResult(advancement, score));
        }
    }

    matches
        .iter()
        .map(|MatcherResult(advancement, _)| *advancement)
        .collect()
}

/// A player's progress on one advancement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub done: bool,
    /// Completed criteria and when, `2022-06-01 12:00:00 +0200`
    pub criteria: Vec<(String, String)>,
}

/// Reads the progress on `advancement` from a player's advancements file, `None` if the
/// player never made any
pub fn progress(file: &Value, advancement: &Advancement) -> Option<Progress> {
    let entry = file.get(format!("minecraft:{}", advancement.key()))?;

    let criteria = entry
        .get("criteria")
        .and_then(Value::as_object)
        .map(|criteria| {
            criteria
                .iter()
                .map(|(name, date)| {
                    (
                        name.strip_prefix("minecraft:").unwrap_or(name).to_string(),
                        date.as_str().unwrap_or_default().to_string(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Some(Progress {
        done: entry.get("done").and_then(Value::as_bool).unwrap_or(false),
        criteria,
    })
}
